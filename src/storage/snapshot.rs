//! Named rkyv snapshots in a flat directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error as RkyvError;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use tracing::debug;

use super::error::{StorageError, StorageResult};

const RKYV_EXTENSION: &str = "rkyv";

const TEMP_EXTENSION: &str = "rkyv.tmp";

#[derive(Debug, Clone)]
/// Stores and retrieves archived artifacts as `<name>.rkyv` files.
///
/// Writes go to `<name>.rkyv.tmp` first and are renamed into place, so a reader never
/// observes a partially written snapshot.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted at `root` (the directory is created on first write).
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures the root directory exists.
    pub fn ensure_root(&self) -> StorageResult<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|_| StorageError::StorageUnavailable {
                path: self.root.clone(),
            })?;
        }
        Ok(())
    }

    /// Returns the final path of snapshot `name`.
    pub fn path_for(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{}.{}", name, RKYV_EXTENSION)))
    }

    fn temp_path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, TEMP_EXTENSION))
    }

    /// Serializes `value` and atomically replaces snapshot `name`.
    pub fn save<T>(&self, name: &str, value: &T) -> StorageResult<PathBuf>
    where
        T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, RkyvError>>,
    {
        let final_path = self.path_for(name)?;
        self.ensure_root()?;

        let bytes = rkyv::to_bytes::<RkyvError>(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let temp_path = self.temp_path_for(name);
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &final_path)?;

        debug!(path = %final_path.display(), bytes = bytes.len(), "Snapshot written");
        Ok(final_path)
    }

    /// Reads, validates and deserializes snapshot `name`.
    pub fn load<T>(&self, name: &str) -> StorageResult<T>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<HighValidator<'a, RkyvError>>
            + Deserialize<T, HighDeserializer<RkyvError>>,
    {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(StorageError::NotFound { path });
        }

        let raw = fs::read(&path)?;
        let mut aligned: AlignedVec = AlignedVec::with_capacity(raw.len());
        aligned.extend_from_slice(&raw);

        let value = rkyv::from_bytes::<T, RkyvError>(&aligned).map_err(|e| {
            StorageError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!(path = %path.display(), bytes = raw.len(), "Snapshot loaded");
        Ok(value)
    }

    /// Returns `true` if snapshot `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Deletes snapshot `name`.
    pub fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(StorageError::NotFound { path });
        }
        fs::remove_file(&path)?;
        Ok(())
    }

    /// Lists snapshot names, sorted.
    pub fn list(&self) -> StorageResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RKYV_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            name: name.to_string(),
        })
    }
}

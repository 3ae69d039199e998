//! CSV and JSON input/output.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{DataError, DataResult};
use super::schema::{Interaction, RawLot, RawParticipant, RawTender};

/// Reads every row of a headered CSV file.
///
/// Columns missing from the header deserialize as `None` on `Raw*` rows; a row with the
/// wrong number of fields is an error that reports the file and line.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> DataResult<Vec<T>> {
    let file = File::open(path).map_err(|source| DataError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(file);

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), rows = rows.len(), "Loaded CSV");
    Ok(rows)
}

/// Writes rows to `path` with a header, creating parent directories.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> DataResult<()> {
    ensure_parent(path)?;

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    for row in rows {
        writer.serialize(row).map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = rows.len(), "Wrote CSV");
    Ok(())
}

/// Writes `value` as pretty-printed JSON.
pub fn write_report<T: Serialize>(path: &Path, value: &T) -> DataResult<()> {
    ensure_parent(path)?;

    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| {
        DataError::Json {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub fn load_tenders(path: &Path) -> DataResult<Vec<RawTender>> {
    read_csv(path)
}

pub fn load_lots(path: &Path) -> DataResult<Vec<RawLot>> {
    read_csv(path)
}

pub fn load_participants(path: &Path) -> DataResult<Vec<RawParticipant>> {
    read_csv(path)
}

pub fn load_interactions(path: &Path) -> DataResult<Vec<Interaction>> {
    read_csv(path)
}

pub fn write_interactions(path: &Path, rows: &[Interaction]) -> DataResult<()> {
    write_csv(path, rows)
}

fn ensure_parent(path: &Path) -> DataResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

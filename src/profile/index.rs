//! Incrementally updatable supplier profile index.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::Interaction;
use crate::hashing::stable_id;
use crate::storage::SnapshotStore;

use super::error::{ProfileError, ProfileResult};
use super::model::SupplierProfile;

/// Archived form of [`ProfileIndex`].
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct ProfileSnapshot {
    /// Profiles sorted by `post_num`.
    pub profiles: Vec<SupplierProfile>,
    /// Sorted `stable_id`s of every ingested lot.
    pub ingested_lots: Vec<u64>,
}

/// Outcome of one [`ProfileIndex::ingest`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub skipped_known_lots: usize,
    pub new_lots: usize,
    pub new_suppliers: usize,
}

/// Supplier profiles keyed by `post_num`.
///
/// Lots are the unit of ingestion: once any row of a lot has been ingested, later rows of
/// that lot are skipped, so feeding overlapping exports never double counts.
#[derive(Debug, Clone, Default)]
pub struct ProfileIndex {
    profiles: HashMap<String, SupplierProfile>,
    ingested_lots: HashSet<u64>,
    total_participations: u64,
    total_wins: u64,
}

impl ProfileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh index from `interactions`.
    pub fn build(interactions: &[Interaction]) -> Self {
        let mut index = Self::new();
        index.ingest(interactions);
        index
    }

    /// Adds interactions of lots not yet seen by this index.
    pub fn ingest(&mut self, interactions: &[Interaction]) -> IngestReport {
        let mut report = IngestReport::default();
        let mut batch_lots: HashSet<u64> = HashSet::new();

        for interaction in interactions {
            let lot_id = stable_id(&interaction.pn_lot);
            if self.ingested_lots.contains(&lot_id) {
                report.skipped_known_lots += 1;
                continue;
            }
            batch_lots.insert(lot_id);

            let profile = self
                .profiles
                .entry(interaction.post_num.clone())
                .or_insert_with(|| {
                    report.new_suppliers += 1;
                    SupplierProfile::new(&interaction.post_num)
                });
            profile.record(interaction);

            self.total_participations += 1;
            if interaction.is_winner {
                self.total_wins += 1;
            }
            report.ingested += 1;
        }

        report.new_lots = batch_lots.len();
        self.ingested_lots.extend(batch_lots);

        info!(
            ingested = report.ingested,
            skipped = report.skipped_known_lots,
            new_suppliers = report.new_suppliers,
            suppliers = self.profiles.len(),
            "Profile index updated"
        );
        report
    }

    pub fn get(&self, post_num: &str) -> Option<&SupplierProfile> {
        self.profiles.get(post_num)
    }

    pub fn contains(&self, post_num: &str) -> bool {
        self.profiles.contains_key(post_num)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SupplierProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn lots_ingested(&self) -> usize {
        self.ingested_lots.len()
    }

    pub fn has_lot(&self, pn_lot: &str) -> bool {
        self.ingested_lots.contains(&stable_id(pn_lot))
    }

    pub fn max_participations(&self) -> u32 {
        self.profiles
            .values()
            .map(|p| p.participations)
            .max()
            .unwrap_or(0)
    }

    /// Share of all participations that were wins.
    pub fn global_win_rate(&self) -> f64 {
        if self.total_participations == 0 {
            0.0
        } else {
            self.total_wins as f64 / self.total_participations as f64
        }
    }

    /// Most recent activity date across all suppliers.
    pub fn newest_activity(&self) -> Option<NaiveDate> {
        self.profiles
            .values()
            .filter_map(|p| p.last_activity_date())
            .max()
    }

    pub fn to_snapshot(&self) -> ProfileSnapshot {
        let mut profiles: Vec<SupplierProfile> = self.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.post_num.cmp(&b.post_num));

        let mut ingested_lots: Vec<u64> = self.ingested_lots.iter().copied().collect();
        ingested_lots.sort_unstable();

        ProfileSnapshot {
            profiles,
            ingested_lots,
        }
    }

    pub fn from_snapshot(snapshot: ProfileSnapshot) -> ProfileResult<Self> {
        let mut index = Self::new();

        for profile in snapshot.profiles {
            if profile.wins > profile.participations {
                return Err(ProfileError::InconsistentSnapshot {
                    reason: format!(
                        "supplier {} has {} wins in {} participations",
                        profile.post_num, profile.wins, profile.participations
                    ),
                });
            }
            index.total_participations += profile.participations as u64;
            index.total_wins += profile.wins as u64;
            if let Some(previous) = index.profiles.insert(profile.post_num.clone(), profile) {
                return Err(ProfileError::InconsistentSnapshot {
                    reason: format!("duplicate supplier {}", previous.post_num),
                });
            }
        }
        index.ingested_lots = snapshot.ingested_lots.into_iter().collect();

        Ok(index)
    }

    /// Persists the index as snapshot `name`.
    pub fn save(&self, store: &SnapshotStore, name: &str) -> ProfileResult<()> {
        let path = store.save(name, &self.to_snapshot())?;
        debug!(path = %path.display(), suppliers = self.len(), "Profile index saved");
        Ok(())
    }

    /// Restores the index from snapshot `name`.
    pub fn load(store: &SnapshotStore, name: &str) -> ProfileResult<Self> {
        let snapshot: ProfileSnapshot = store.load(name)?;
        Self::from_snapshot(snapshot)
    }

    /// Restores snapshot `name`, or starts empty when it does not exist yet.
    pub fn load_or_default(store: &SnapshotStore, name: &str) -> ProfileResult<Self> {
        if store.exists(name) {
            Self::load(store, name)
        } else {
            Ok(Self::new())
        }
    }
}

//! Procurement CSV exports: schema, loading, cleaning and merging.
//!
//! The pipeline is `load_*` -> [`Cleaner::clean_all`] -> [`merge`] -> [`write_interactions`].
//! Everything downstream (profile index, ranking, models) reads the merged
//! [`Interaction`] rows rather than the raw exports.

pub mod cleaning;
pub mod error;
pub mod loader;
pub mod merge;
pub mod schema;


pub use cleaning::{
    Cleaner, CleaningReport, ClipBounds, TableReport, clip_bounds, normalize_okpd2,
    normalize_region, okpd2_from_ktru, parse_bool, parse_date, parse_price, quantile,
};
pub use error::{DataError, DataResult};
pub use loader::{
    load_interactions, load_lots, load_participants, load_tenders, read_csv, write_csv,
    write_interactions, write_report,
};
pub use merge::{MergeReport, merge};
pub use schema::{Interaction, Lot, Participant, RawLot, RawParticipant, RawTender, Tender};

use std::path::Path;

use serde::Serialize;

/// Combined report written by the `prepare` step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrepareReport {
    pub cleaning: CleaningReport,
    pub merge: MergeReport,
}

/// Loads, cleans and merges the three exports.
pub fn prepare(
    cleaner: &Cleaner,
    tenders_path: &Path,
    lots_path: &Path,
    participants_path: &Path,
) -> DataResult<(Vec<Interaction>, PrepareReport)> {
    let tenders = load_tenders(tenders_path)?;
    let lots = load_lots(lots_path)?;
    let participants = load_participants(participants_path)?;

    let (tenders, lots, participants, cleaning) = cleaner.clean_all(tenders, lots, participants);
    let (interactions, merge) = merge(&tenders, &lots, &participants);

    Ok((interactions, PrepareReport { cleaning, merge }))
}

use super::*;
use crate::fixtures::{InteractionBuilder, synthetic_market};
use crate::storage::SnapshotStore;
use chrono::NaiveDate;
use tempfile::TempDir;

fn two_lot_history() -> Vec<crate::data::Interaction> {
    vec![
        InteractionBuilder::new("L1", "S1")
            .okpd2("26.20.11.110")
            .ktru("26.20.11.110-00000001")
            .region("moscow")
            .start(1000.0)
            .bid(900.0)
            .winner()
            .date("2023-03-01")
            .build(),
        InteractionBuilder::new("L2", "S1")
            .okpd2("26.20.40.120")
            .region("kazan")
            .start(3000.0)
            .bid(2400.0)
            .date("2023-05-10")
            .build(),
        InteractionBuilder::new("L2", "S2")
            .okpd2("26.20.40.120")
            .region("kazan")
            .start(3000.0)
            .bid(2000.0)
            .winner()
            .date("2023-05-10")
            .build(),
    ]
}

#[test]
fn test_code_matches_prefix() {
    assert!(code_matches_prefix("26.20.11", "26.20.11"));
    assert!(code_matches_prefix("26.20.11", "26.20"));
    assert!(code_matches_prefix("26.20.11", "26"));
    assert!(!code_matches_prefix("26.20.11", "26.2"));
    assert!(!code_matches_prefix("26", "26.20"));
    assert!(!code_matches_prefix("27.20", "26"));
}

#[test]
fn test_profile_aggregates() {
    let index = ProfileIndex::build(&two_lot_history());
    let s1 = index.get("S1").expect("S1");

    assert_eq!(s1.participations, 2);
    assert_eq!(s1.wins, 1);
    assert_eq!(s1.raw_win_rate(), 0.5);
    assert_eq!(s1.mean_bid(), Some(1650.0));
    assert_eq!(s1.typical_lot_price(), Some(2000.0));
    assert!((s1.mean_discount().expect("discount") - 0.15).abs() < 1e-12);
    assert_eq!(s1.region_affinity("moscow"), 0.5);
    assert_eq!(s1.category_affinity("26.20"), 1.0);
    assert_eq!(s1.category_affinity("26.20.11"), 0.5);
    assert_eq!(s1.category_affinity("27"), 0.0);
    assert_eq!(s1.ktru_affinity("26.20.11.110-00000001"), 0.5);
    assert!(s1.serves_ktru("26.20.11.110-00000001"));
    assert!(s1.serves_category("26"));
    assert!(!s1.serves_region("omsk"));
    assert_eq!(
        s1.last_activity_date(),
        NaiveDate::from_ymd_opt(2023, 5, 10)
    );
}

#[test]
fn test_supplier_region_falls_back_to_lot_region() {
    let mut row = InteractionBuilder::new("L1", "S1").region("omsk").build();
    row.supplier_region = None;

    let index = ProfileIndex::build(&[row]);
    assert!(index.get("S1").expect("S1").serves_region("omsk"));
}

#[test]
fn test_win_rate_smoothing() {
    let index = ProfileIndex::build(&two_lot_history());
    let s2 = index.get("S2").expect("S2");

    assert_eq!(s2.raw_win_rate(), 1.0);
    let smoothed = s2.win_rate_smoothed(0.2, 4.0);
    assert!((smoothed - (1.0 + 0.8) / 5.0).abs() < 1e-12);

    let empty = SupplierProfile::new("X");
    assert_eq!(empty.win_rate_smoothed(0.3, 0.0), 0.3);
}

#[test]
fn test_index_globals() {
    let index = ProfileIndex::build(&two_lot_history());

    assert_eq!(index.len(), 2);
    assert_eq!(index.lots_ingested(), 2);
    assert_eq!(index.max_participations(), 2);
    assert!((index.global_win_rate() - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(index.newest_activity(), NaiveDate::from_ymd_opt(2023, 5, 10));
    assert!(index.has_lot("L1"));
    assert!(!index.has_lot("L3"));
}

#[test]
fn test_empty_index() {
    let index = ProfileIndex::new();
    assert!(index.is_empty());
    assert_eq!(index.global_win_rate(), 0.0);
    assert_eq!(index.max_participations(), 0);
    assert_eq!(index.newest_activity(), None);
}

#[test]
fn test_incremental_ingest_skips_known_lots() {
    let history = two_lot_history();
    let mut index = ProfileIndex::build(&history[..1]);

    let report = index.ingest(&history);
    assert_eq!(report.skipped_known_lots, 1);
    assert_eq!(report.ingested, 2);
    assert_eq!(report.new_lots, 1);
    assert_eq!(report.new_suppliers, 1);

    let again = index.ingest(&history);
    assert_eq!(again.ingested, 0);
    assert_eq!(again.skipped_known_lots, 3);

    let full = ProfileIndex::build(&history);
    assert_eq!(index.to_snapshot(), full.to_snapshot());
}

#[test]
fn test_snapshot_roundtrip_through_store() {
    let dir = TempDir::new().expect("temp dir");
    let store = SnapshotStore::new(dir.path().to_path_buf());
    let index = ProfileIndex::build(&synthetic_market(30));

    index.save(&store, "profiles").expect("save");
    let restored = ProfileIndex::load(&store, "profiles").expect("load");

    assert_eq!(restored.to_snapshot(), index.to_snapshot());
    assert_eq!(restored.global_win_rate(), index.global_win_rate());
    assert!(restored.has_lot("L0007"));
}

#[test]
fn test_load_or_default_without_snapshot() {
    let dir = TempDir::new().expect("temp dir");
    let store = SnapshotStore::new(dir.path().to_path_buf());

    let index = ProfileIndex::load_or_default(&store, "profiles").expect("load");
    assert!(index.is_empty());
}

#[test]
fn test_from_snapshot_rejects_inconsistent_profiles() {
    let mut profile = SupplierProfile::new("S1");
    profile.wins = 3;
    profile.participations = 1;

    let err = ProfileIndex::from_snapshot(ProfileSnapshot {
        profiles: vec![profile],
        ingested_lots: vec![],
    })
    .unwrap_err();
    assert!(matches!(err, ProfileError::InconsistentSnapshot { .. }));

    let duplicate = ProfileSnapshot {
        profiles: vec![SupplierProfile::new("S1"), SupplierProfile::new("S1")],
        ingested_lots: vec![],
    };
    assert!(ProfileIndex::from_snapshot(duplicate).is_err());
}

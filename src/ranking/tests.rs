use super::*;
use super::scorer::{price_fit, recency_score};
use chrono::NaiveDate;
use crate::config::ConfigError;
use crate::fixtures::{InteractionBuilder, synthetic_market};
use crate::profile::{ProfileIndex, SupplierProfile};
use serial_test::serial;
use std::env;

fn market_index() -> ProfileIndex {
    ProfileIndex::build(&synthetic_market(60))
}

fn single_profile(start: Option<f64>) -> SupplierProfile {
    let mut builder = InteractionBuilder::new("L1", "S1")
        .okpd2("26.20.11.110")
        .ktru("26.20.11.110-00000001")
        .region("moscow")
        .bid(900.0)
        .winner();
    if let Some(start) = start {
        builder = builder.start(start);
    }
    let index = ProfileIndex::build(&[builder.build()]);
    index.get("S1").cloned().expect("profile exists")
}

fn post_nums(outcome: &RankingOutcome) -> Vec<&str> {
    outcome
        .candidates
        .iter()
        .map(|c| c.post_num.as_str())
        .collect()
}

// --- relaxation ladder ---

#[test]
fn test_ladder_full_query() {
    let query = LotQuery::new(5)
        .okpd2("26.20.11.110")
        .region("moscow")
        .start_price(1000.0);

    let labels: Vec<String> = ladder(&query).iter().map(|l| l.label()).collect();
    assert_eq!(
        labels,
        vec![
            "strict",
            "no_price",
            "no_region",
            "prefix:26.20.11",
            "prefix:26.20",
            "prefix:26",
            "global"
        ]
    );
}

#[test]
fn test_ladder_skips_levels_without_query_values() {
    let query = LotQuery::new(5).okpd2("26.20");
    let levels = ladder(&query);

    assert_eq!(levels.first(), Some(&RelaxationLevel::Strict));
    assert!(!levels.contains(&RelaxationLevel::NoPrice));
    assert!(!levels.contains(&RelaxationLevel::NoRegion));
    assert_eq!(levels.len(), 3);
    assert_eq!(levels.last(), Some(&RelaxationLevel::Global));
}

#[test]
fn test_ladder_with_ktru_widens_to_full_okpd2_first() {
    let query = LotQuery::new(5).ktru("26.20.11.110-00000001").normalized();
    assert_eq!(query.okpd2_code.as_deref(), Some("26.20.11.110"));

    let levels = ladder(&query);
    assert_eq!(
        levels[1],
        RelaxationLevel::CategoryPrefix {
            prefix: "26.20.11.110".to_string(),
            dropped: 0
        }
    );
    assert_eq!(
        levels[2],
        RelaxationLevel::CategoryPrefix {
            prefix: "26.20.11".to_string(),
            dropped: 1
        }
    );
}

#[test]
fn test_ladder_without_category_goes_straight_to_global() {
    let levels = ladder(&LotQuery::new(5));
    assert_eq!(levels, vec![RelaxationLevel::Strict, RelaxationLevel::Global]);
}

#[test]
fn test_multipliers_decrease_and_floor() {
    let prefix = |dropped| RelaxationLevel::CategoryPrefix {
        prefix: "26".to_string(),
        dropped,
    };

    assert_eq!(RelaxationLevel::Strict.multiplier(), 1.0);
    assert!(RelaxationLevel::NoPrice.multiplier() < RelaxationLevel::Strict.multiplier());
    assert!(RelaxationLevel::NoRegion.multiplier() < RelaxationLevel::NoPrice.multiplier());
    assert!(prefix(0).multiplier() < RelaxationLevel::NoRegion.multiplier());
    assert!(prefix(2).multiplier() < prefix(1).multiplier());
    assert!((prefix(5).multiplier() - 0.5).abs() < 1e-12);
    assert!((prefix(9).multiplier() - 0.5).abs() < 1e-12);
    assert!(RelaxationLevel::Global.multiplier() < prefix(9).multiplier());
}

#[test]
fn test_level_serializes_with_tag() {
    let level = RelaxationLevel::CategoryPrefix {
        prefix: "26.20".to_string(),
        dropped: 2,
    };
    let json = serde_json::to_value(&level).expect("serialize");
    assert_eq!(json["level"], "category_prefix");
    assert_eq!(json["prefix"], "26.20");
    assert_eq!(level.to_string(), "prefix:26.20");
}

// --- admission ---

#[test]
fn test_admits_price_band() {
    let profile = single_profile(Some(1000.0));
    let near = LotQuery::new(5).okpd2("26.20.11.110").start_price(1400.0);
    let far = LotQuery::new(5).okpd2("26.20.11.110").start_price(2500.0);

    assert!(admits(&RelaxationLevel::Strict, &profile, &near, 0.5));
    assert!(!admits(&RelaxationLevel::Strict, &profile, &far, 0.5));
    assert!(admits(&RelaxationLevel::NoPrice, &profile, &far, 0.5));
}

#[test]
fn test_admits_unknown_price_fails_strict_only() {
    let profile = single_profile(None);
    let query = LotQuery::new(5).okpd2("26.20.11.110").start_price(1000.0);

    assert!(!admits(&RelaxationLevel::Strict, &profile, &query, 0.5));
    assert!(admits(&RelaxationLevel::NoPrice, &profile, &query, 0.5));
}

#[test]
fn test_admits_region_and_category() {
    let profile = single_profile(Some(1000.0));
    let elsewhere = LotQuery::new(5).okpd2("26.20.11.110").region("kazan");
    let other_category = LotQuery::new(5).okpd2("41.20.40.000").region("moscow");

    assert!(!admits(&RelaxationLevel::NoPrice, &profile, &elsewhere, 0.5));
    assert!(admits(&RelaxationLevel::NoRegion, &profile, &elsewhere, 0.5));
    assert!(!admits(&RelaxationLevel::NoRegion, &profile, &other_category, 0.5));
    assert!(admits(&RelaxationLevel::Global, &profile, &other_category, 0.5));
}

#[test]
fn test_admits_ktru_takes_precedence() {
    let profile = single_profile(Some(1000.0));
    let same_okpd2_other_ktru = LotQuery::new(5)
        .okpd2("26.20.11.110")
        .ktru("26.20.11.110-00000002");

    assert!(!admits(&RelaxationLevel::NoRegion, &profile, &same_okpd2_other_ktru, 0.5));
    let widened = RelaxationLevel::CategoryPrefix {
        prefix: "26.20.11.110".to_string(),
        dropped: 0,
    };
    assert!(admits(&widened, &profile, &same_okpd2_other_ktru, 0.5));
}

#[test]
fn test_price_fit_shape() {
    let profile = single_profile(Some(1000.0));

    let exact = LotQuery::new(5).start_price(1000.0);
    assert!((price_fit(&profile, &exact, 0.5) - 1.0).abs() < 1e-12);

    let edge = LotQuery::new(5).start_price(500.0);
    assert!(price_fit(&profile, &edge, 0.5).abs() < 1e-12);

    let near = LotQuery::new(5).start_price(1100.0);
    let fit = price_fit(&profile, &near, 0.5);
    assert!(fit > 0.8 && fit < 1.0);

    assert_eq!(price_fit(&profile, &LotQuery::new(5), 0.5), 0.5);
    assert_eq!(price_fit(&single_profile(None), &exact, 0.5), 0.5);
}

// --- ranking ---

#[test]
fn test_recency_score_window_and_decay() {
    let newest = NaiveDate::from_ymd_opt(2024, 12, 31);
    let days_before = |days: i64| newest.map(|d| d - chrono::Duration::days(days));

    assert_eq!(recency_score(newest, newest, 100), 1.0);
    assert_eq!(recency_score(newest, days_before(100), 100), 1.0);
    assert!((recency_score(newest, days_before(200), 100) - 0.5).abs() < 1e-12);
    assert!((recency_score(newest, days_before(150), 100) - 0.75).abs() < 1e-12);
    assert_eq!(recency_score(newest, days_before(300), 100), 0.0);
    assert_eq!(recency_score(newest, days_before(1000), 100), 0.0);
}

#[test]
fn test_recency_score_unknown_dates() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1);
    assert_eq!(recency_score(None, date, 100), 0.5);
    assert_eq!(recency_score(date, None, 100), 0.5);
    assert_eq!(recency_score(None, None, 100), 0.5);
}

#[test]
fn test_strict_level_finds_cell_specialists() {
    let ranker = SupplierRanker::default();
    let query = LotQuery::new(3)
        .okpd2("26.20.11.110")
        .region("moscow")
        .start_price(1200.0);

    let outcome = ranker.rank(&market_index(), &query).expect("rank");

    assert_eq!(post_nums(&outcome), vec!["S000", "S001", "S002"]);
    assert_eq!(outcome.level_reached, Some(RelaxationLevel::Strict));
    assert_eq!(outcome.levels_tried, 1);
    assert!(!outcome.refined);
    assert!(outcome.candidates.iter().all(|c| c.level == RelaxationLevel::Strict));
    assert!(outcome.candidates[0].score > outcome.candidates[1].score);
}

#[test]
fn test_scores_are_bounded_and_breakdown_consistent() {
    let ranker = SupplierRanker::default();
    let query = LotQuery::new(10).okpd2("26.20.11.110").region("moscow");

    let outcome = ranker.rank(&market_index(), &query).expect("rank");
    for candidate in &outcome.candidates {
        let b = candidate.breakdown;
        for value in [b.win_rate, b.experience, b.category, b.region, b.price, b.recency] {
            assert!((0.0..=1.0).contains(&value), "{candidate:?}");
        }
        assert!(candidate.score >= 0.0 && candidate.score <= b.multiplier + 1e-12);
        assert_eq!(b.multiplier, candidate.level.multiplier());
    }
}

#[test]
fn test_relaxation_falls_back_to_category_prefix() {
    let ranker = SupplierRanker::default();
    let query = LotQuery::new(3).okpd2("26.20.11.999").region("moscow");

    let outcome = ranker.rank(&market_index(), &query).expect("rank");

    assert_eq!(
        outcome.level_reached,
        Some(RelaxationLevel::CategoryPrefix {
            prefix: "26.20.11".to_string(),
            dropped: 1
        })
    );
    assert_eq!(outcome.levels_tried, 3);
    assert_eq!(outcome.candidates.len(), 3);
    assert!((outcome.candidates[0].breakdown.multiplier - 0.7).abs() < 1e-12);
    // Category 0 winners come first, whichever region.
    let top: Vec<&str> = post_nums(&outcome)[..2].to_vec();
    assert!(top.contains(&"S000"));
}

#[test]
fn test_stricter_levels_listed_first() {
    let ranker = SupplierRanker::default();
    let query = LotQuery::new(10).okpd2("26.20.11.110").region("moscow");

    let outcome = ranker.rank(&market_index(), &query).expect("rank");
    assert_eq!(outcome.candidates.len(), 10);

    let multipliers: Vec<f64> = outcome
        .candidates
        .iter()
        .map(|c| c.level.multiplier())
        .collect();
    assert!(multipliers.windows(2).all(|w| w[0] >= w[1]));

    // Four moscow suppliers of category 0, then the kazan ones.
    assert!(outcome.candidates[..4]
        .iter()
        .all(|c| c.level == RelaxationLevel::Strict));
    assert_eq!(outcome.candidates[4].level, RelaxationLevel::NoRegion);
    assert_eq!(outcome.level_reached, Some(RelaxationLevel::Global));
}

#[test]
fn test_no_duplicates_across_levels() {
    let ranker = SupplierRanker::default();
    let query = LotQuery::new(50).okpd2("26.20.11.110").region("moscow");

    let outcome = ranker.rank(&market_index(), &query).expect("rank");
    let mut names = post_nums(&outcome);
    let before = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), before);
}

#[test]
fn test_exclude_removes_suppliers() {
    let ranker = SupplierRanker::default();
    let query = LotQuery::new(3)
        .okpd2("26.20.11.110")
        .region("moscow")
        .exclude(vec!["S000".to_string()]);

    let outcome = ranker.rank(&market_index(), &query).expect("rank");
    assert!(outcome.position_of("S000").is_none());
    assert_eq!(outcome.candidates.len(), 3);
}

#[test]
fn test_min_participations_filters_everyone() {
    let config = RankingConfig {
        min_participations: 11,
        ..Default::default()
    };
    let ranker = SupplierRanker::new(config).expect("valid config");
    let query = LotQuery::new(3).okpd2("26.20.11.110").region("moscow");

    let outcome = ranker.rank(&market_index(), &query).expect("rank");
    assert!(outcome.is_empty());
    assert_eq!(outcome.level_reached, None);
    assert_eq!(outcome.levels_tried, ladder(&query.normalized()).len());
}

#[test]
fn test_two_stage_refinement_on_large_level() {
    let config = RankingConfig::default().with_refinement(5, 2);
    let ranker = SupplierRanker::new(config).expect("valid config");

    let outcome = ranker.rank(&market_index(), &LotQuery::new(2)).expect("rank");

    assert!(outcome.refined);
    assert_eq!(outcome.candidates.len(), 2);
    assert!(outcome.candidates.iter().all(|c| c.level == RelaxationLevel::Strict));

    let mut strict = post_nums(&outcome);
    strict.sort();
    assert_eq!(strict, vec!["S000", "S010"]);
}

#[test]
fn test_refinement_keeps_at_least_top_k() {
    let config = RankingConfig::default().with_refinement(5, 2);
    let ranker = SupplierRanker::new(config).expect("valid config");

    let outcome = ranker.rank(&market_index(), &LotQuery::new(10)).expect("rank");

    assert!(outcome.refined);
    assert_eq!(outcome.candidates.len(), 10);
    assert_eq!(outcome.level_reached, Some(RelaxationLevel::Strict));
}

#[test]
fn test_refined_out_suppliers_do_not_return_at_looser_levels() {
    let config = RankingConfig::default()
        .with_refinement(5, 2)
        .with_min_candidates(24);
    let ranker = SupplierRanker::new(config).expect("valid config");

    let outcome = ranker.rank(&market_index(), &LotQuery::new(6)).expect("rank");

    assert_eq!(outcome.candidates.len(), 6);
    assert!(outcome.candidates.iter().all(|c| c.level == RelaxationLevel::Strict));
    assert_eq!(outcome.level_reached, Some(RelaxationLevel::Strict));
    assert_eq!(outcome.levels_tried, ladder(&LotQuery::new(6)).len());
}

#[test]
fn test_min_candidates_continues_relaxing() {
    let config = RankingConfig::default().with_min_candidates(6);
    let ranker = SupplierRanker::new(config).expect("valid config");
    let query = LotQuery::new(3).okpd2("26.20.11.110").region("moscow");

    let outcome = ranker.rank(&market_index(), &query).expect("rank");
    assert_eq!(outcome.level_reached, Some(RelaxationLevel::NoRegion));
    assert_eq!(outcome.candidates.len(), 3);
}

#[test]
fn test_ranking_is_deterministic() {
    let ranker = SupplierRanker::default();
    let index = market_index();
    let query = LotQuery::new(8).okpd2("41.20").region("kazan").start_price(2300.0);

    let first = ranker.rank(&index, &query).expect("rank");
    let second = ranker.rank(&index, &query).expect("rank");
    assert_eq!(first, second);
}

#[test]
fn test_query_is_normalized() {
    let ranker = SupplierRanker::default();
    let index = market_index();

    let messy = LotQuery::new(3).okpd2(" 26.20.11.110. ").region("  MOSCOW ");
    let clean = LotQuery::new(3).okpd2("26.20.11.110").region("moscow");
    assert_eq!(
        ranker.rank(&index, &messy).expect("rank"),
        ranker.rank(&index, &clean).expect("rank")
    );
}

#[test]
fn test_rank_rejects_invalid_queries() {
    let ranker = SupplierRanker::default();
    let index = market_index();

    assert!(matches!(
        ranker.rank(&index, &LotQuery::new(0)),
        Err(RankingError::InvalidQuery { .. })
    ));
    assert!(matches!(
        ranker.rank(&index, &LotQuery::new(3).start_price(-5.0)),
        Err(RankingError::InvalidQuery { .. })
    ));
}

#[test]
fn test_empty_index_returns_empty_outcome() {
    let ranker = SupplierRanker::default();
    let outcome = ranker
        .rank(&ProfileIndex::new(), &LotQuery::new(5).okpd2("26"))
        .expect("rank");
    assert!(outcome.is_empty());
    assert_eq!(outcome.levels_tried, 0);
}

// --- configuration ---

#[test]
fn test_weights_normalized() {
    let weights = ScoreWeights::default().normalized();
    assert!((weights.sum() - 1.0).abs() < 1e-12);

    let doubled = ScoreWeights {
        win_rate: 2.0,
        experience: 2.0,
        category: 0.0,
        region: 0.0,
        price: 0.0,
        recency: 0.0,
    };
    assert_eq!(doubled.normalized().win_rate, 0.5);
}

#[test]
fn test_config_validation() {
    assert!(RankingConfig::default().validate().is_ok());

    let bad_refine = RankingConfig::default().with_refinement(10, 20);
    assert!(matches!(
        bad_refine.validate(),
        Err(ConfigError::InvalidValue { name: "coarse_keep", .. })
    ));

    let negative = RankingConfig::default().with_weights(ScoreWeights {
        price: -0.1,
        ..Default::default()
    });
    assert!(negative.validate().is_err());

    let zero = RankingConfig::default().with_weights(ScoreWeights {
        win_rate: 0.0,
        experience: 0.0,
        category: 0.0,
        region: 0.0,
        price: 0.0,
        recency: 0.0,
    });
    assert!(zero.validate().is_err());

    assert!(RankingConfig::default().with_price_band(0.0).validate().is_err());
    assert!(matches!(
        SupplierRanker::new(RankingConfig::default().with_price_band(-1.0)),
        Err(RankingError::Config(_))
    ));
}

fn clear_rank_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        for var in [
            "TENDER_RANK_W_WIN_RATE",
            "TENDER_RANK_W_EXPERIENCE",
            "TENDER_RANK_W_CATEGORY",
            "TENDER_RANK_W_REGION",
            "TENDER_RANK_W_PRICE",
            "TENDER_RANK_W_RECENCY",
            "TENDER_RANK_PRICE_BAND",
            "TENDER_RANK_MIN_CANDIDATES",
            "TENDER_RANK_MIN_PARTICIPATIONS",
            "TENDER_RANK_REFINE_THRESHOLD",
            "TENDER_RANK_COARSE_KEEP",
            "TENDER_RANK_RECENCY_DAYS",
        ] {
            env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_ranking_config_from_env() {
    clear_rank_env();
    assert_eq!(RankingConfig::from_env().expect("defaults"), RankingConfig::default());

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::set_var("TENDER_RANK_W_WIN_RATE", "1.0");
        env::set_var("TENDER_RANK_MIN_CANDIDATES", "4");
        env::set_var("TENDER_RANK_PRICE_BAND", "0.3");
    }
    let config = RankingConfig::from_env().expect("valid env");
    assert_eq!(config.weights.win_rate, 1.0);
    assert_eq!(config.min_candidates, Some(4));
    assert_eq!(config.price_band, 0.3);

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe { env::set_var("TENDER_RANK_COARSE_KEEP", "many") };
    assert!(matches!(
        RankingConfig::from_env(),
        Err(ConfigError::ParseError { .. })
    ));

    clear_rank_env();
}

#[test]
#[serial]
fn test_ranking_config_rejects_out_of_range_integers() {
    clear_rank_env();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe { env::set_var("TENDER_RANK_MIN_PARTICIPATIONS", "4294967296") };
    assert!(matches!(
        RankingConfig::from_env(),
        Err(ConfigError::ParseError { name: "TENDER_RANK_MIN_PARTICIPATIONS", .. })
    ));

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe { env::set_var("TENDER_RANK_MIN_PARTICIPATIONS", "3") };
    assert_eq!(RankingConfig::from_env().expect("valid env").min_participations, 3);

    clear_rank_env();
}

// --- evaluation ---

#[test]
fn test_hit_rate_on_synthetic_market() {
    let rows = synthetic_market(60);
    let (train, holdout): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| r.pn_lot.as_str() < "L0048");

    let report = evaluate_hit_rate(&SupplierRanker::default(), &train, &holdout, 1).expect("eval");

    assert_eq!(report.lots_evaluated, 12);
    assert_eq!(report.hits, 12);
    assert_eq!(report.hit_rate, 1.0);
    assert_eq!(report.mean_reciprocal_rank, 1.0);
    assert_eq!(report.levels.get("strict"), Some(&12));
}

#[test]
fn test_hit_rate_skips_unusable_lots() {
    let train = synthetic_market(30);
    let holdout = vec![
        InteractionBuilder::new("X1", "NEWCOMER")
            .okpd2("26.20.11.110")
            .region("moscow")
            .winner()
            .build(),
        InteractionBuilder::new("X2", "S000")
            .okpd2("26.20.11.110")
            .region("moscow")
            .build(),
        InteractionBuilder::new("X3", "S000")
            .okpd2("26.20.11.110")
            .region("moscow")
            .winner()
            .build(),
    ];

    let report = evaluate_hit_rate(&SupplierRanker::default(), &train, &holdout, 3).expect("eval");
    assert_eq!(report.skipped_unknown_winner, 1);
    assert_eq!(report.skipped_no_winner, 1);
    assert_eq!(report.lots_evaluated, 1);
    assert_eq!(report.hits, 1);

    assert!(evaluate_hit_rate(&SupplierRanker::default(), &train, &holdout, 0).is_err());
}

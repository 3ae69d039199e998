//! Progressive relaxation of the region / price / category filters.

use crate::profile::SupplierProfile;

use super::types::{LotQuery, RelaxationLevel};

/// Returns the levels to try for `query`, strictest first.
///
/// Levels that would admit exactly the same suppliers as the previous one are omitted:
/// `NoPrice` without a query price, `NoRegion` without a query region.
pub fn ladder(query: &LotQuery) -> Vec<RelaxationLevel> {
    let mut levels = vec![RelaxationLevel::Strict];

    if query.start_price.is_some() {
        levels.push(RelaxationLevel::NoPrice);
    }
    if query.region.is_some() {
        levels.push(RelaxationLevel::NoRegion);
    }

    if let Some(code) = query.okpd2_code.as_deref() {
        let segments: Vec<&str> = code.split('.').collect();
        if query.ktru_code.is_some() {
            levels.push(RelaxationLevel::CategoryPrefix {
                prefix: code.to_string(),
                dropped: 0,
            });
        }
        for keep in (1..segments.len()).rev() {
            levels.push(RelaxationLevel::CategoryPrefix {
                prefix: segments[..keep].join("."),
                dropped: segments.len() - keep,
            });
        }
    }

    levels.push(RelaxationLevel::Global);
    levels
}

/// Returns `true` if `profile` passes the filters of `level`.
pub fn admits(
    level: &RelaxationLevel,
    profile: &SupplierProfile,
    query: &LotQuery,
    price_band: f64,
) -> bool {
    match level {
        RelaxationLevel::Strict => {
            category_ok(profile, query)
                && region_ok(profile, query)
                && price_ok(profile, query, price_band)
        }
        RelaxationLevel::NoPrice => category_ok(profile, query) && region_ok(profile, query),
        RelaxationLevel::NoRegion => category_ok(profile, query),
        RelaxationLevel::CategoryPrefix { prefix, .. } => profile.serves_category(prefix),
        RelaxationLevel::Global => profile.wins > 0,
    }
}

fn category_ok(profile: &SupplierProfile, query: &LotQuery) -> bool {
    match (query.ktru_code.as_deref(), query.okpd2_code.as_deref()) {
        (Some(ktru), _) => profile.serves_ktru(ktru),
        (None, Some(okpd2)) => profile.serves_category(okpd2),
        (None, None) => true,
    }
}

fn region_ok(profile: &SupplierProfile, query: &LotQuery) -> bool {
    query
        .region
        .as_deref()
        .is_none_or(|region| profile.serves_region(region))
}

fn price_ok(profile: &SupplierProfile, query: &LotQuery, band: f64) -> bool {
    let Some(start) = query.start_price else {
        return true;
    };
    profile
        .typical_lot_price()
        .is_some_and(|typical| typical >= start * (1.0 - band) && typical <= start * (1.0 + band))
}

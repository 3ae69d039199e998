//! Row types for the tender, lot and participant exports.
//!
//! `Raw*` rows mirror the CSV files column for column with every field optional and
//! untyped, so sentinel handling happens in one place ([`Cleaner`](super::Cleaner)).
//! The typed rows are what cleaning produces and merging consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawTender {
    pub tender_id: Option<String>,
    pub customer_id: Option<String>,
    pub region: Option<String>,
    pub publish_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawLot {
    pub pn_lot: Option<String>,
    pub tender_id: Option<String>,
    pub okpd2_code: Option<String>,
    pub ktru_code: Option<String>,
    pub start_price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawParticipant {
    pub pn_lot: Option<String>,
    pub post_num: Option<String>,
    pub supplier_region: Option<String>,
    pub bid_price: Option<String>,
    pub is_winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tender {
    pub tender_id: String,
    pub customer_id: Option<String>,
    pub region: Option<String>,
    pub publish_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub pn_lot: String,
    pub tender_id: Option<String>,
    pub okpd2_code: Option<String>,
    pub ktru_code: Option<String>,
    pub start_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub pn_lot: String,
    pub post_num: String,
    pub supplier_region: Option<String>,
    pub bid_price: Option<f64>,
    pub is_winner: bool,
}

/// One merged `(lot, participant)` row.
///
/// This is the persisted contract between `prepare` and every downstream step
/// (`interactions.csv`). Dates are stored as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Interaction {
    pub pn_lot: String,
    pub post_num: String,
    pub tender_id: Option<String>,
    pub okpd2_code: Option<String>,
    pub ktru_code: Option<String>,
    pub lot_region: Option<String>,
    pub supplier_region: Option<String>,
    pub start_price: Option<f64>,
    pub bid_price: Option<f64>,
    pub is_winner: bool,
    pub publish_date: Option<String>,
}

impl Interaction {
    /// `1 - bid/start` when both prices are known.
    pub fn discount(&self) -> Option<f64> {
        match (self.bid_price, self.start_price) {
            (Some(bid), Some(start)) if start > 0.0 => Some(1.0 - bid / start),
            _ => None,
        }
    }

    pub fn publish_date(&self) -> Option<NaiveDate> {
        self.publish_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

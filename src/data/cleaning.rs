//! Sentinel replacement, key filtering, deduplication and price clipping.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::MIN_ROWS_FOR_CLIPPING;

use super::schema::{Lot, Participant, RawLot, RawParticipant, RawTender, Tender};

/// Per-table counters collected while cleaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub sentinel_replacements: usize,
    pub dropped_missing_key: usize,
    pub invalid_numbers: usize,
    pub duplicates: usize,
    pub clipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub tenders: TableReport,
    pub lots: TableReport,
    pub participants: TableReport,
    /// Winners demoted because their lot already had a cheaper winner.
    pub demoted_winners: usize,
}

/// Clip bounds actually applied to a price column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClipBounds {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone)]
pub struct Cleaner {
    sentinels: Vec<String>,
    clip_low: f64,
    clip_high: f64,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Cleaner {
    pub fn new(sentinels: &[String], clip_low: f64, clip_high: f64) -> Self {
        Self {
            sentinels: sentinels.iter().map(|s| s.trim().to_lowercase()).collect(),
            clip_low,
            clip_high,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.sentinels, config.clip_low, config.clip_high)
    }

    /// Returns `true` if `value` (trimmed, case-insensitive) is a missing-value marker.
    pub fn is_sentinel(&self, value: &str) -> bool {
        let value = value.trim().to_lowercase();
        value.is_empty() || self.sentinels.iter().any(|s| *s == value)
    }

    pub fn clean_tenders(&self, rows: Vec<RawTender>) -> (Vec<Tender>, TableReport) {
        let mut report = TableReport {
            rows_in: rows.len(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(tender_id) = self.text(row.tender_id, &mut report) else {
                report.dropped_missing_key += 1;
                continue;
            };
            if !seen.insert(tender_id.clone()) {
                report.duplicates += 1;
                continue;
            }

            let publish_date = match self.text(row.publish_date, &mut report) {
                Some(raw) => {
                    let parsed = parse_date(&raw);
                    if parsed.is_none() {
                        report.invalid_numbers += 1;
                    }
                    parsed
                }
                None => None,
            };

            out.push(Tender {
                tender_id,
                customer_id: self.text(row.customer_id, &mut report),
                region: self.text(row.region, &mut report).map(|r| normalize_region(&r)),
                publish_date,
            });
        }

        report.rows_out = out.len();
        debug!(?report, "Cleaned tenders");
        (out, report)
    }

    pub fn clean_lots(&self, rows: Vec<RawLot>) -> (Vec<Lot>, TableReport) {
        let mut report = TableReport {
            rows_in: rows.len(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut out: Vec<Lot> = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(pn_lot) = self.text(row.pn_lot, &mut report) else {
                report.dropped_missing_key += 1;
                continue;
            };
            if !seen.insert(pn_lot.clone()) {
                report.duplicates += 1;
                continue;
            }

            let ktru_code = self.text(row.ktru_code, &mut report);
            let okpd2_code = self
                .text(row.okpd2_code, &mut report)
                .map(|c| normalize_okpd2(&c))
                .filter(|c| !c.is_empty())
                .or_else(|| ktru_code.as_deref().and_then(okpd2_from_ktru));

            let start_price = self.price(row.start_price, &mut report);

            out.push(Lot {
                pn_lot,
                tender_id: self.text(row.tender_id, &mut report),
                okpd2_code,
                ktru_code,
                start_price,
            });
        }

        let mut prices: Vec<&mut Option<f64>> = out.iter_mut().map(|l| &mut l.start_price).collect();
        report.clipped = self.clip_column(&mut prices, "start_price");

        report.rows_out = out.len();
        debug!(?report, "Cleaned lots");
        (out, report)
    }

    /// Cleans participant rows and enforces at most one winner per lot.
    ///
    /// Returns the rows, the table report and the number of demoted winners.
    pub fn clean_participants(
        &self,
        rows: Vec<RawParticipant>,
    ) -> (Vec<Participant>, TableReport, usize) {
        let mut report = TableReport {
            rows_in: rows.len(),
            ..Default::default()
        };
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut out: Vec<Participant> = Vec::with_capacity(rows.len());

        for row in rows {
            let pn_lot = self.text(row.pn_lot, &mut report);
            let post_num = self.text(row.post_num, &mut report);
            let (Some(pn_lot), Some(post_num)) = (pn_lot, post_num) else {
                report.dropped_missing_key += 1;
                continue;
            };

            let participant = Participant {
                supplier_region: self
                    .text(row.supplier_region, &mut report)
                    .map(|r| normalize_region(&r)),
                bid_price: self.price(row.bid_price, &mut report),
                is_winner: self
                    .text(row.is_winner, &mut report)
                    .map(|v| parse_bool(&v))
                    .unwrap_or(false),
                pn_lot,
                post_num,
            };

            match index.entry((participant.pn_lot.clone(), participant.post_num.clone())) {
                Entry::Occupied(slot) => {
                    report.duplicates += 1;
                    let existing = &mut out[*slot.get()];
                    if !existing.is_winner && participant.is_winner {
                        *existing = participant;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(out.len());
                    out.push(participant);
                }
            }
        }

        let mut prices: Vec<&mut Option<f64>> = out.iter_mut().map(|p| &mut p.bid_price).collect();
        report.clipped = self.clip_column(&mut prices, "bid_price");

        let demoted = enforce_single_winner(&mut out);
        if demoted > 0 {
            warn!(demoted, "Lots with multiple winners; kept the lowest bid");
        }

        report.rows_out = out.len();
        debug!(?report, demoted, "Cleaned participants");
        (out, report, demoted)
    }

    /// Cleans all three tables and returns them with a combined report.
    pub fn clean_all(
        &self,
        tenders: Vec<RawTender>,
        lots: Vec<RawLot>,
        participants: Vec<RawParticipant>,
    ) -> (Vec<Tender>, Vec<Lot>, Vec<Participant>, CleaningReport) {
        let (tenders, tenders_report) = self.clean_tenders(tenders);
        let (lots, lots_report) = self.clean_lots(lots);
        let (participants, participants_report, demoted_winners) =
            self.clean_participants(participants);

        let report = CleaningReport {
            tenders: tenders_report,
            lots: lots_report,
            participants: participants_report,
            demoted_winners,
        };

        info!(
            tenders = tenders.len(),
            lots = lots.len(),
            participants = participants.len(),
            "Cleaning complete"
        );

        (tenders, lots, participants, report)
    }

    fn text(&self, value: Option<String>, report: &mut TableReport) -> Option<String> {
        let value = value?;
        if self.is_sentinel(&value) {
            if !value.trim().is_empty() {
                report.sentinel_replacements += 1;
            }
            return None;
        }
        Some(value.trim().to_string())
    }

    fn price(&self, value: Option<String>, report: &mut TableReport) -> Option<f64> {
        let raw = self.text(value, report)?;
        let parsed = parse_price(&raw);
        if parsed.is_none() {
            report.invalid_numbers += 1;
        }
        parsed
    }

    fn clip_column(&self, values: &mut [&mut Option<f64>], column: &str) -> usize {
        let observed: Vec<f64> = values.iter().filter_map(|v| **v).collect();
        let Some(bounds) = clip_bounds(&observed, self.clip_low, self.clip_high) else {
            debug!(column, observed = observed.len(), "Too few values to clip");
            return 0;
        };

        let mut clipped = 0;
        for value in values.iter_mut() {
            if let Some(v) = &mut **value {
                let bounded = v.clamp(bounds.low, bounds.high);
                if bounded != *v {
                    *v = bounded;
                    clipped += 1;
                }
            }
        }

        debug!(column, low = bounds.low, high = bounds.high, clipped, "Clipped prices");
        clipped
    }
}

/// Computes quantile clip bounds, or `None` when there are too few values.
pub fn clip_bounds(values: &[f64], low: f64, high: f64) -> Option<ClipBounds> {
    if values.len() < MIN_ROWS_FOR_CLIPPING {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    Some(ClipBounds {
        low: quantile(&sorted, low),
        high: quantile(&sorted, high),
    })
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Parses a price, accepting `,` as the decimal separator and ignoring inner spaces.
///
/// Non-finite and non-positive values are rejected.
pub fn parse_price(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "1.0" | "true" | "t" | "yes" | "y"
    )
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

pub fn normalize_okpd2(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_string()
}

/// Extracts the OKPD2 part of a KTRU code (`26.20.11.110-00000001` -> `26.20.11.110`).
pub fn okpd2_from_ktru(ktru: &str) -> Option<String> {
    let head = ktru.split('-').next()?.trim();
    let head = normalize_okpd2(head);
    (!head.is_empty()).then_some(head)
}

pub fn normalize_region(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn enforce_single_winner(participants: &mut [Participant]) -> usize {
    let mut best: HashMap<&str, usize> = HashMap::new();
    for (i, p) in participants.iter().enumerate() {
        if !p.is_winner {
            continue;
        }
        match best.entry(p.pn_lot.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(mut slot) => {
                let current = participants[*slot.get()].bid_price.unwrap_or(f64::INFINITY);
                if p.bid_price.unwrap_or(f64::INFINITY) < current {
                    slot.insert(i);
                }
            }
        }
    }

    let keep: HashSet<usize> = best.into_values().collect();
    let mut demoted = 0;
    for (i, p) in participants.iter_mut().enumerate() {
        if p.is_winner && !keep.contains(&i) {
            p.is_winner = false;
            demoted += 1;
        }
    }
    demoted
}

//! Joins cleaned tables into [`Interaction`] rows.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use super::schema::{Interaction, Lot, Participant, Tender};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub interactions: usize,
    /// Participants whose lot is absent from the lot table (dropped).
    pub orphan_participants: usize,
    /// Lots with no tender id or an unknown one (kept, tender fields empty).
    pub lots_without_tender: usize,
    /// Lots that nobody bid on.
    pub lots_without_participants: usize,
    pub lots_with_winner: usize,
}

/// Inner-joins participants to lots on `pn_lot` and left-joins lots to tenders.
///
/// The output is sorted by `(pn_lot, post_num)`.
pub fn merge(
    tenders: &[Tender],
    lots: &[Lot],
    participants: &[Participant],
) -> (Vec<Interaction>, MergeReport) {
    let tenders_by_id: HashMap<&str, &Tender> =
        tenders.iter().map(|t| (t.tender_id.as_str(), t)).collect();
    let lots_by_id: HashMap<&str, &Lot> = lots.iter().map(|l| (l.pn_lot.as_str(), l)).collect();

    let mut report = MergeReport {
        lots_without_tender: lots
            .iter()
            .filter(|l| {
                l.tender_id
                    .as_deref()
                    .is_none_or(|id| !tenders_by_id.contains_key(id))
            })
            .count(),
        ..Default::default()
    };

    let mut lots_seen: HashMap<&str, bool> = HashMap::new();
    let mut interactions = Vec::with_capacity(participants.len());

    for participant in participants {
        let Some(lot) = lots_by_id.get(participant.pn_lot.as_str()) else {
            report.orphan_participants += 1;
            continue;
        };

        let tender = lot
            .tender_id
            .as_deref()
            .and_then(|id| tenders_by_id.get(id));

        let has_winner = lots_seen.entry(lot.pn_lot.as_str()).or_insert(false);
        *has_winner |= participant.is_winner;

        interactions.push(Interaction {
            pn_lot: lot.pn_lot.clone(),
            post_num: participant.post_num.clone(),
            tender_id: lot.tender_id.clone(),
            okpd2_code: lot.okpd2_code.clone(),
            ktru_code: lot.ktru_code.clone(),
            lot_region: tender.and_then(|t| t.region.clone()),
            supplier_region: participant.supplier_region.clone(),
            start_price: lot.start_price,
            bid_price: participant.bid_price,
            is_winner: participant.is_winner,
            publish_date: tender
                .and_then(|t| t.publish_date)
                .map(|d| d.format("%Y-%m-%d").to_string()),
        });
    }

    interactions.sort_by(|a, b| {
        a.pn_lot
            .cmp(&b.pn_lot)
            .then_with(|| a.post_num.cmp(&b.post_num))
    });

    report.interactions = interactions.len();
    report.lots_without_participants = lots.len() - lots_seen.len();
    report.lots_with_winner = lots_seen.values().filter(|w| **w).count();

    if report.orphan_participants > 0 {
        warn!(
            orphans = report.orphan_participants,
            "Dropped participants of unknown lots"
        );
    }
    info!(
        interactions = report.interactions,
        lots_with_winner = report.lots_with_winner,
        "Merge complete"
    );

    (interactions, report)
}

//! Interaction builders shared by unit tests.

use crate::data::Interaction;

#[derive(Default)]
pub struct InteractionBuilder {
    pn_lot: String,
    post_num: String,
    okpd2_code: Option<String>,
    ktru_code: Option<String>,
    lot_region: Option<String>,
    supplier_region: Option<String>,
    start_price: Option<f64>,
    bid_price: Option<f64>,
    is_winner: bool,
    publish_date: Option<String>,
}

impl InteractionBuilder {
    pub fn new(pn_lot: &str, post_num: &str) -> Self {
        Self {
            pn_lot: pn_lot.to_string(),
            post_num: post_num.to_string(),
            ..Default::default()
        }
    }

    pub fn okpd2(mut self, code: &str) -> Self {
        self.okpd2_code = Some(code.to_string());
        self
    }

    pub fn ktru(mut self, code: &str) -> Self {
        self.ktru_code = Some(code.to_string());
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.lot_region = Some(region.to_string());
        self.supplier_region = Some(region.to_string());
        self
    }

    pub fn supplier_region(mut self, region: &str) -> Self {
        self.supplier_region = Some(region.to_string());
        self
    }

    pub fn start(mut self, price: f64) -> Self {
        self.start_price = Some(price);
        self
    }

    pub fn bid(mut self, price: f64) -> Self {
        self.bid_price = Some(price);
        self
    }

    pub fn winner(mut self) -> Self {
        self.is_winner = true;
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.publish_date = Some(date.to_string());
        self
    }

    pub fn build(self) -> Interaction {
        Interaction {
            pn_lot: self.pn_lot,
            post_num: self.post_num,
            tender_id: None,
            okpd2_code: self.okpd2_code,
            ktru_code: self.ktru_code,
            lot_region: self.lot_region,
            supplier_region: self.supplier_region,
            start_price: self.start_price,
            bid_price: self.bid_price,
            is_winner: self.is_winner,
            publish_date: self.publish_date,
        }
    }
}

pub const CATEGORIES: [&str; 3] = ["26.20.11.110", "41.20.40.000", "86.10.10.000"];
pub const REGIONS: [&str; 2] = ["moscow", "kazan"];

/// Deterministic market: supplier `S{c}{r}{k}` specializes in category `c`, region `r`.
///
/// Every lot has three bidders from its own (category, region) cell plus one outsider.
/// The first specialist of the cell (`k == 0`) wins every lot of the first two categories,
/// the second one (`k == 1`) every lot of the third. Outsiders never win.
pub fn synthetic_market(lots: usize) -> Vec<Interaction> {
    let mut rows = Vec::new();
    for i in 0..lots {
        let c = i % CATEGORIES.len();
        let r = (i / CATEGORIES.len()) % REGIONS.len();
        let pn_lot = format!("L{i:04}");
        let start = 1_000.0 * (1 + c) as f64 * (1.0 + (i % 5) as f64 * 0.1);
        let date = format!("2023-{:02}-{:02}", 1 + (i % 12), 1 + (i % 28));
        let winner_k = if i % 3 == 2 { 1 } else { 0 };

        for k in 0..3 {
            let mut builder = InteractionBuilder::new(&pn_lot, &format!("S{c}{r}{k}"))
                .okpd2(CATEGORIES[c])
                .region(REGIONS[r])
                .start(start)
                .bid(start * (0.9 - 0.02 * k as f64))
                .date(&date);
            if k == winner_k {
                builder = builder.winner();
            }
            rows.push(builder.build());
        }

        let outsider = (c + 1) % CATEGORIES.len();
        rows.push(
            InteractionBuilder::new(&pn_lot, &format!("S{outsider}{r}9"))
                .okpd2(CATEGORIES[c])
                .region(REGIONS[r])
                .start(start)
                .bid(start * 0.95)
                .date(&date)
                .build(),
        );
    }
    rows
}

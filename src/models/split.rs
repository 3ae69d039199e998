use tracing::info;

use crate::data::Interaction;
use crate::hashing::holdout_bucket;

/// Splits interactions by lot into `(train, holdout)`.
///
/// All rows of one lot land on the same side, and the assignment of a lot never changes
/// as more data arrives.
pub fn train_holdout_split(
    interactions: &[Interaction],
    fraction: f64,
) -> (Vec<Interaction>, Vec<Interaction>) {
    let (holdout, train): (Vec<Interaction>, Vec<Interaction>) = interactions
        .iter()
        .cloned()
        .partition(|row| holdout_bucket(&row.pn_lot, fraction));

    info!(
        train = train.len(),
        holdout = holdout.len(),
        fraction,
        "Interactions split by lot"
    );

    (train, holdout)
}

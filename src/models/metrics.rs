//! Evaluation metrics. Inputs are parallel slices; empty inputs yield `0.0`.

use std::cmp::Ordering;

const LOG_LOSS_EPS: f64 = 1e-7;

pub fn accuracy(probabilities: &[f32], labels: &[bool], threshold: f32) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = probabilities
        .iter()
        .zip(labels)
        .filter(|&(&p, &y)| (p >= threshold) == y)
        .count();
    correct as f64 / labels.len() as f64
}

/// Returns `(precision, recall)` of the positive class.
pub fn precision_recall(probabilities: &[f32], labels: &[bool], threshold: f32) -> (f64, f64) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&p, &y) in probabilities.iter().zip(labels) {
        match (p >= threshold, y) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    (ratio(tp, tp + fp), ratio(tp, tp + fn_))
}

/// Area under the ROC curve via the rank-sum statistic, averaging ranks of ties.
///
/// Returns `0.5` when only one class is present.
pub fn roc_auc(scores: &[f32], labels: &[bool]) -> f64 {
    let n = scores.len().min(labels.len());
    let positives = labels[..n].iter().filter(|&&y| y).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group i..=j.
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = (0..n).filter(|&i| labels[i]).map(|i| ranks[i]).sum();
    let p = positives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

pub fn log_loss(probabilities: &[f32], labels: &[bool]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| {
            let p = (p as f64).clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            if y { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    total / labels.len() as f64
}

pub fn mae(predicted: &[f64], actual: &[f64]) -> f64 {
    mean(predicted.iter().zip(actual).map(|(p, a)| (p - a).abs()))
}

pub fn rmse(predicted: &[f64], actual: &[f64]) -> f64 {
    mean(predicted.iter().zip(actual).map(|(p, a)| (p - a).powi(2))).sqrt()
}

/// Mean absolute percentage error; rows with a zero actual value are skipped.
pub fn mape(predicted: &[f64], actual: &[f64]) -> f64 {
    mean(
        predicted
            .iter()
            .zip(actual)
            .filter(|(_, a)| **a != 0.0)
            .map(|(p, a)| ((p - a) / a).abs()),
    )
}

/// Share of queries whose relevant item appears among the first `k` ranked items.
pub fn recall_at_k<S: AsRef<str>>(ranked: &[Vec<S>], relevant: &[S], k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let hits = ranked
        .iter()
        .zip(relevant)
        .filter(|(list, target)| {
            list.iter()
                .take(k)
                .any(|item| item.as_ref() == target.as_ref())
        })
        .count();
    hits as f64 / relevant.len() as f64
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

//! Small tensor helpers shared by the trainers.

use candle_core::{Device, Result, Tensor};
use candle_nn::{Init, Linear, VarBuilder};

/// Numerically stable binary cross-entropy on raw logits, averaged over all elements.
///
/// Uses `max(x, 0) - x * t + ln(1 + exp(-|x|))`, which stays finite for saturated logits.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let positive_part = logits.relu()?;
    let label_term = (logits * targets)?;
    let soft = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    ((positive_part - label_term)? + soft)?.mean_all()
}

/// Linear layer with zero-initialized weight and bias.
pub fn zero_linear(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let weight = vb.get_with_hints((out_dim, in_dim), "weight", Init::Const(0.0))?;
    let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

/// Stacks equally wide rows into a `(rows, width)` tensor.
pub fn matrix(rows: &[Vec<f32>], width: usize, device: &Device) -> Result<Tensor> {
    let data: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::from_vec(data, (rows.len(), width), device)
}

/// Column vector of `0.0` / `1.0` labels.
pub fn label_column(labels: &[bool], device: &Device) -> Result<Tensor> {
    let data: Vec<f32> = labels.iter().map(|&y| if y { 1.0 } else { 0.0 }).collect();
    Tensor::from_vec(data, (labels.len(), 1), device)
}

/// `(start, len)` ranges covering `0..n` in steps of `batch_size`.
pub fn batches(n: usize, batch_size: usize) -> impl Iterator<Item = (usize, usize)> {
    let step = batch_size.max(1);
    (0..n).step_by(step).map(move |start| (start, step.min(n - start)))
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

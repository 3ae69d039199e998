//! Linear winning-price regressor on hashed lot features.

use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{AdamW, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use serde::Serialize;
use tracing::{debug, info};

use crate::data::Interaction;

use super::config::TrainConfig;
use super::error::{ModelError, ModelResult};
use super::features::{Standardizer, hashed_row};
use super::metrics::{mae, mape, rmse};
use super::nn::{batches, matrix, zero_linear};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegressorReport {
    pub rows: usize,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
}

/// Rows the regressor learns from: winning bids with a known price.
pub fn priced_winners(interactions: &[Interaction]) -> Vec<&Interaction> {
    interactions
        .iter()
        .filter(|r| r.is_winner && r.bid_price.is_some_and(|b| b > 0.0))
        .collect()
}

/// Predicts the winning bid of a lot from its start price, category and region.
///
/// Trained on standardized `ln(bid_price)`; predictions are mapped back to prices.
pub struct PriceRegressor {
    linear: Linear,
    standardizer: Standardizer,
    target_mean: f64,
    target_std: f64,
    hash_buckets: usize,
    varmap: VarMap,
    device: Device,
}

impl std::fmt::Debug for PriceRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceRegressor")
            .field("device", &format!("{:?}", self.device))
            .field("hash_buckets", &self.hash_buckets)
            .field("target_mean", &self.target_mean)
            .finish()
    }
}

impl PriceRegressor {
    pub fn fit(train: &[Interaction], config: &TrainConfig, device: &Device) -> ModelResult<Self> {
        let rows = priced_winners(train);
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet {
                what: "price regressor (no winning bids with a price)",
            });
        }

        let raw: Vec<Vec<f32>> = rows
            .iter()
            .map(|r| hashed_row(r, config.hash_buckets))
            .collect();
        let standardizer = Standardizer::fit(&raw);
        let features: Vec<Vec<f32>> = raw.iter().map(|r| standardizer.transform(r)).collect();

        let targets: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.bid_price)
            .map(f64::ln)
            .collect();
        let n = targets.len();
        let target_mean = targets.iter().sum::<f64>() / n as f64;
        let variance = targets.iter().map(|t| (t - target_mean).powi(2)).sum::<f64>() / n as f64;
        let target_std = if variance.sqrt() > 1e-9 {
            variance.sqrt()
        } else {
            1.0
        };

        let width = standardizer.width();
        let x = matrix(&features, width, device)?;
        let scaled: Vec<f32> = targets
            .iter()
            .map(|t| ((t - target_mean) / target_std) as f32)
            .collect();
        let y = Tensor::from_vec(scaled, (n, 1), device)?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let linear = zero_linear(width, 1, vb.pp("regressor"))?;

        let params = ParamsAdamW {
            lr: config.learning_rate,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(varmap.all_vars(), params)?;

        for epoch in 0..config.epochs {
            let mut epoch_loss = 0.0;
            let mut steps = 0usize;
            for (start, len) in batches(n, config.batch_size) {
                let xb = x.narrow(0, start, len)?;
                let yb = y.narrow(0, start, len)?;
                let loss = candle_nn::loss::mse(&linear.forward(&xb)?, &yb)?;
                optimizer.backward_step(&loss)?;
                epoch_loss += loss.to_scalar::<f32>()? as f64;
                steps += 1;
            }
            debug!(epoch, loss = epoch_loss / steps.max(1) as f64, "Regressor epoch");
        }

        info!(
            rows = n,
            features = width,
            epochs = config.epochs,
            "Price regressor trained"
        );

        Ok(Self {
            linear,
            standardizer,
            target_mean,
            target_std,
            hash_buckets: config.hash_buckets,
            varmap,
            device: device.clone(),
        })
    }

    /// Predicted winning price of each lot row.
    pub fn predict(&self, interactions: &[&Interaction]) -> ModelResult<Vec<f64>> {
        if interactions.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Vec<f32>> = interactions
            .iter()
            .map(|r| self.standardizer.transform(&hashed_row(r, self.hash_buckets)))
            .collect();
        let x = matrix(&rows, self.standardizer.width(), &self.device)?;

        let outputs = self.linear.forward(&x)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(outputs
            .into_iter()
            .map(|o| (o as f64 * self.target_std + self.target_mean).exp())
            .collect())
    }

    /// Price-space errors on the priced winners of `holdout`.
    pub fn evaluate(&self, holdout: &[Interaction]) -> ModelResult<RegressorReport> {
        let rows = priced_winners(holdout);
        let predicted = self.predict(&rows)?;
        let actual: Vec<f64> = rows.iter().filter_map(|r| r.bid_price).collect();

        Ok(RegressorReport {
            rows: rows.len(),
            mae: mae(&predicted, &actual),
            rmse: rmse(&predicted, &actual),
            mape: mape(&predicted, &actual),
        })
    }

    /// Prediction of a constant model at the training mean, for comparison.
    pub fn baseline_price(&self) -> f64 {
        self.target_mean.exp()
    }

    /// Writes the weights as safetensors.
    pub fn save(&self, path: &Path) -> ModelResult<()> {
        self.varmap.save(path)?;
        debug!(path = %path.display(), "Regressor weights saved");
        Ok(())
    }
}

//! Logistic-regression winner classifier.

use std::path::Path;

use candle_core::{DType, Device, Module};
use candle_nn::{AdamW, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use serde::Serialize;
use tracing::{debug, info};

use crate::data::Interaction;
use crate::profile::ProfileIndex;

use super::config::TrainConfig;
use super::error::{ModelError, ModelResult};
use super::features::{CLASSIFIER_FEATURES, FeatureBuilder, Standardizer};
use super::metrics::{accuracy, log_loss, precision_recall, roc_auc};
use super::nn::{batches, bce_with_logits, label_column, matrix, sigmoid, zero_linear};

const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifierReport {
    pub rows: usize,
    pub positives: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub roc_auc: f64,
    pub log_loss: f64,
}

/// Predicts whether a participant wins its lot.
///
/// Features come from a [`FeatureBuilder`] over a profile index that must be built from
/// training interactions only.
pub struct WinnerClassifier {
    linear: Linear,
    standardizer: Standardizer,
    varmap: VarMap,
    device: Device,
}

impl std::fmt::Debug for WinnerClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WinnerClassifier")
            .field("device", &format!("{:?}", self.device))
            .field("features", &self.standardizer.width())
            .finish()
    }
}

impl WinnerClassifier {
    pub fn fit(
        train: &[Interaction],
        index: &ProfileIndex,
        config: &TrainConfig,
        device: &Device,
    ) -> ModelResult<Self> {
        if train.is_empty() {
            return Err(ModelError::EmptyTrainingSet {
                what: "winner classifier",
            });
        }

        let builder = FeatureBuilder::new(index);
        let raw = builder.rows(train);
        let standardizer = Standardizer::fit(&raw);
        let rows: Vec<Vec<f32>> = raw.iter().map(|r| standardizer.transform(r)).collect();

        let width = CLASSIFIER_FEATURES.len();
        let x = matrix(&rows, width, device)?;
        let labels: Vec<bool> = train.iter().map(|r| r.is_winner).collect();
        let y = label_column(&labels, device)?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let linear = zero_linear(width, 1, vb.pp("classifier"))?;

        let params = ParamsAdamW {
            lr: config.learning_rate,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(varmap.all_vars(), params)?;

        let n = rows.len();
        for epoch in 0..config.epochs {
            let mut epoch_loss = 0.0;
            let mut steps = 0usize;
            for (start, len) in batches(n, config.batch_size) {
                let xb = x.narrow(0, start, len)?;
                let yb = y.narrow(0, start, len)?;
                let loss = bce_with_logits(&linear.forward(&xb)?, &yb)?;
                optimizer.backward_step(&loss)?;
                epoch_loss += loss.to_scalar::<f32>()? as f64;
                steps += 1;
            }
            debug!(epoch, loss = epoch_loss / steps.max(1) as f64, "Classifier epoch");
        }

        info!(
            rows = n,
            positives = labels.iter().filter(|&&y| y).count(),
            epochs = config.epochs,
            "Winner classifier trained"
        );

        Ok(Self {
            linear,
            standardizer,
            varmap,
            device: device.clone(),
        })
    }

    /// Win probability of each interaction.
    pub fn predict_proba(
        &self,
        interactions: &[Interaction],
        index: &ProfileIndex,
    ) -> ModelResult<Vec<f32>> {
        if interactions.is_empty() {
            return Ok(Vec::new());
        }

        let builder = FeatureBuilder::new(index);
        let rows: Vec<Vec<f32>> = builder
            .rows(interactions)
            .iter()
            .map(|r| self.standardizer.transform(r))
            .collect();
        let x = matrix(&rows, self.standardizer.width(), &self.device)?;

        let logits = self.linear.forward(&x)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(logits.into_iter().map(sigmoid).collect())
    }

    pub fn evaluate(
        &self,
        holdout: &[Interaction],
        index: &ProfileIndex,
    ) -> ModelResult<ClassifierReport> {
        let probabilities = self.predict_proba(holdout, index)?;
        let labels: Vec<bool> = holdout.iter().map(|r| r.is_winner).collect();
        let (precision, recall) = precision_recall(&probabilities, &labels, DECISION_THRESHOLD);

        Ok(ClassifierReport {
            rows: labels.len(),
            positives: labels.iter().filter(|&&y| y).count(),
            accuracy: accuracy(&probabilities, &labels, DECISION_THRESHOLD),
            precision,
            recall,
            roc_auc: roc_auc(&probabilities, &labels),
            log_loss: log_loss(&probabilities, &labels),
        })
    }

    /// Writes the weights as safetensors.
    pub fn save(&self, path: &Path) -> ModelResult<()> {
        self.varmap.save(path)?;
        debug!(path = %path.display(), "Classifier weights saved");
        Ok(())
    }
}

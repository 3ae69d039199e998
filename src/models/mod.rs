//! Trainable candidate models: winner classifier, price regressor, two-tower recommender
//! and the binary-quantized retrieval index built from its supplier embeddings.
//!
//! All models are trained with candle on the device chosen by [`select_device`] and are
//! evaluated on a lot-level holdout produced by [`train_holdout_split`].

pub mod classifier;
pub mod config;
pub mod device;
pub mod error;
pub mod features;
pub mod metrics;
mod nn;
pub mod regressor;
pub mod retrieval;
pub mod split;
pub mod two_tower;


pub use classifier::{ClassifierReport, WinnerClassifier};
pub use config::TrainConfig;
pub use device::select_device;
pub use error::{ModelError, ModelResult};
pub use features::{
    CLASSIFIER_FEATURES, FeatureBuilder, PriceBuckets, Standardizer, Vocabulary, hashed_row,
};
pub use regressor::{PriceRegressor, RegressorReport, priced_winners};
pub use retrieval::{RetrievalHit, RetrievalIndex, RetrievalReport, RetrievalSnapshot};
pub use split::train_holdout_split;
pub use two_tower::{Recommendation, TwoTowerModel, TwoTowerReport, TwoTowerVocab};

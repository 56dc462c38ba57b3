//! thyra-classifiers: thyroid nodule malignancy prediction.
//!
//! This crate loads the labeled patient table, fits a category codec and a
//! standard scaler, balances the training split with SMOTE and trains a
//! gradient-boosted classifier. The fitted parts are persisted together as a
//! versioned bundle by `store::ModelStore`, which trains on demand the first
//! time a prediction is requested.
//!
//! ```no_run
//! use std::sync::Arc;
//! use thyra_classifiers::config::{ArtifactConfig, TrainingConfig};
//! use thyra_classifiers::inference::InferenceService;
//! use thyra_classifiers::pipeline::TrainingPipeline;
//! use thyra_classifiers::store::ModelStore;
//!
//! let trainer = TrainingPipeline::new(TrainingConfig::default())
//!     .into_trainer("data/thyroid_cancer_risk_data.csv");
//! let store = Arc::new(ModelStore::new(ArtifactConfig::default(), Arc::new(trainer)));
//! let service = InferenceService::new(store);
//! service.warm_up()?;
//! # Ok::<(), thyra_classifiers::error::PredictionError>(())
//! ```
pub mod codec;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod inference;
pub mod io;
pub mod math;
pub mod models;
pub mod oversampling;
pub mod pipeline;
pub mod preprocessing;
pub mod stats;
pub mod store;

pub use data_handling::{Label, RawFeatureRecord};
pub use error::{PredictionError, Result};

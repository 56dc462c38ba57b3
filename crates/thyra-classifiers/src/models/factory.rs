use crate::config::{ModelConfig, ModelType};
use crate::error::Result;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::gbdt::GBDTClassifier;

/// Build an unfitted classifier from a `ModelConfig`.
pub fn build_model(params: ModelConfig) -> Box<dyn ClassifierModel> {
    match params.model_type {
        ModelType::GBDT { .. } => Box::new(GBDTClassifier::new(params)),
    }
}

/// Rebuild a fitted classifier from its persisted JSON.
pub fn restore_model(params: ModelConfig, json: &str) -> Result<Box<dyn ClassifierModel>> {
    match params.model_type {
        ModelType::GBDT { .. } => Ok(Box::new(GBDTClassifier::from_json(params, json)?)),
    }
}

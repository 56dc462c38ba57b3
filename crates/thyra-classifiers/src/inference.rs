//! Single-record prediction against the active bundle.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::encode_record;
use crate::data_handling::{Label, RawFeatureRecord};
use crate::error::{PredictionError, Result};
use crate::math::Array2;
use crate::models::classifier_trait::label_from_probability;
use crate::preprocessing::transform;
use crate::store::{ModelArtifactBundle, ModelStore};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    /// Probability of the malignant class.
    pub probability: f32,
}

/// Encode, scale and classify one record with `bundle`.
pub fn predict_with_bundle(
    bundle: &ModelArtifactBundle,
    record: &RawFeatureRecord,
) -> Result<Prediction> {
    let encoded = encode_record(record, &bundle.category_map)?;
    let scaled = transform(&encoded, &bundle.scaler)?;
    let width = scaled.len();
    let x = Array2::from_shape_vec((1, width), scaled.into_vec())
        .map_err(|e| PredictionError::Training(e.to_string()))?;

    let probability = bundle
        .classifier
        .predict_proba(&x)?
        .first()
        .copied()
        .ok_or_else(|| PredictionError::Training("classifier returned no prediction".into()))?;

    Ok(Prediction {
        label: label_from_probability(probability),
        probability,
    })
}

pub struct InferenceService {
    store: Arc<ModelStore>,
}

impl InferenceService {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Load (or train) the bundle ahead of the first request.
    pub fn warm_up(&self) -> Result<()> {
        let bundle = self.store.load_or_train()?;
        log::info!("Model bundle {} ready", bundle.version());
        Ok(())
    }

    /// Drop the cached bundle and load the one currently active on disk.
    /// Returns its version.
    pub fn reload(&self) -> Result<String> {
        self.store.reload();
        let bundle = self.store.load_or_train()?;
        log::info!("Reloaded model bundle {}", bundle.version());
        Ok(bundle.version().to_string())
    }

    pub fn predict(&self, record: &RawFeatureRecord) -> Result<Label> {
        Ok(self.predict_detailed(record)?.label)
    }

    pub fn predict_detailed(&self, record: &RawFeatureRecord) -> Result<Prediction> {
        let bundle = self.store.load_or_train()?;
        let prediction = predict_with_bundle(&bundle, record)?;
        log::debug!(
            "Predicted {} (p = {:.4}) with bundle {}",
            prediction.label,
            prediction.probability,
            bundle.version()
        );
        Ok(prediction)
    }
}

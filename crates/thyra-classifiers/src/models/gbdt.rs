use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;

use crate::config::{ModelConfig, ModelType};
use crate::data_handling::Label;
use crate::error::{PredictionError, Result};
use crate::math::Array2;
use crate::models::classifier_trait::ClassifierModel;

/// Loss that makes `GBDT::predict` return probabilities for labels in {-1, 1}.
const BINARY_LOSS: &str = "LogLikelyhood";

/// Gradient Boosting Decision Tree (GBDT) classifier
pub struct GBDTClassifier {
    model: Option<GBDT>,
    params: ModelConfig,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GBDTClassifier {
            model: None,
            params,
        }
    }

    /// Restore a fitted model from `to_json` output.
    pub fn from_json(params: ModelConfig, json: &str) -> Result<Self> {
        let model: GBDT = serde_json::from_str(json).map_err(|e| {
            PredictionError::CorruptArtifact(format!("failed to parse GBDT model: {}", e))
        })?;
        Ok(GBDTClassifier {
            model: Some(model),
            params,
        })
    }

    fn fitted(&self) -> Result<&GBDT> {
        self.model
            .as_ref()
            .ok_or_else(|| PredictionError::Training("GBDT model has not been fit".to_string()))
    }
}

/// LogLikelyhood expects +1 for the positive class and -1 otherwise.
fn signed_label(label: Label) -> f32 {
    match label {
        Label::Malignant => 1.0,
        Label::Benign => -1.0,
    }
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[Label]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PredictionError::Training(format!(
                "feature rows ({}) and labels ({}) differ",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(PredictionError::Training(
                "no training samples provided".to_string(),
            ));
        }

        let ModelType::GBDT {
            max_depth,
            num_boost_round,
            debug,
            training_optimization_level,
            loss_type,
        } = &self.params.model_type;

        if loss_type != BINARY_LOSS {
            return Err(PredictionError::Training(format!(
                "unsupported GBDT loss '{}', expected '{}'",
                loss_type, BINARY_LOSS
            )));
        }

        let mut config = Config::new();
        config.set_feature_size(x.ncols());
        config.set_shrinkage(self.params.learning_rate);
        config.set_max_depth(*max_depth);
        config.set_iterations(*num_boost_round as usize);
        config.set_debug(*debug);
        config.set_training_optimization_level(*training_optimization_level);
        config.set_loss(loss_type);

        let mut gbdt = GBDT::new(&config);

        let mut train_x: DataVec = x
            .rows()
            .zip(y.iter())
            .map(|(row, &label)| Data::new_training_data(row.to_vec(), 1.0, signed_label(label), None))
            .collect();

        log::debug!(
            "Fitting GBDT on {} rows x {} features ({} rounds, depth {})",
            x.nrows(),
            x.ncols(),
            num_boost_round,
            max_depth
        );
        gbdt.fit(&mut train_x);

        self.model = Some(gbdt);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        let model = self.fitted()?;
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        let test_x: DataVec = x
            .rows()
            .map(|row| Data::new_test_data(row.to_vec(), None))
            .collect();
        Ok(model.predict(&test_x))
    }

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self.fitted()?)?)
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

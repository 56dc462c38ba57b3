use crate::data_handling::Label;
use crate::error::Result;
use crate::math::Array2;

/// Binary classifier contract shared by the training pipeline and the
/// inference service. Fitted models are read-only and shared across threads.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model on scaled features.
    fn fit(&mut self, x: &Array2<f32>, y: &[Label]) -> Result<()>;

    /// Probability of `Label::Malignant` for every row of `x`.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f32>>;

    /// Hard labels, thresholded at 0.5.
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<Label>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(label_from_probability)
            .collect())
    }

    /// Serialized fitted parameters.
    fn to_json(&self) -> Result<String>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

pub fn label_from_probability(p: f32) -> Label {
    Label::from_class_index(usize::from(p >= 0.5))
}

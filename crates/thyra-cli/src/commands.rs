use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use thyra_classifiers::inference::{InferenceService, Prediction};
use thyra_classifiers::pipeline::{TrainingOutcome, TrainingPipeline};
use thyra_classifiers::RawFeatureRecord;

use crate::config::ServiceConfig;
use crate::util::validate_tsv_or_csv_file;

/// Train a bundle from `config.dataset_path` and make it the active one.
pub fn run_training(config: &ServiceConfig) -> Result<TrainingOutcome> {
    let dataset = config.dataset_path.to_string_lossy();
    validate_tsv_or_csv_file(&dataset)?;

    let outcome = TrainingPipeline::new(config.training.clone())
        .train(&config.dataset_path)
        .with_context(|| format!("Training on {} failed", dataset))?;

    config
        .model_store()
        .save(&outcome.bundle)
        .with_context(|| {
            format!(
                "Failed to save model bundle to {}",
                config.artifacts.dir.display()
            )
        })?;

    log::info!(
        "Model bundle {} written to {}",
        outcome.bundle.version(),
        config.artifacts.dir.display()
    );
    Ok(outcome)
}

pub fn load_record<P: AsRef<Path>>(path: P) -> Result<RawFeatureRecord> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record: {}", path.display()))?;
    let record: RawFeatureRecord = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse record: {}", path.display()))?;
    Ok(record)
}

/// Predict one record read from a JSON file, training first if needed.
pub fn run_prediction<P: AsRef<Path>>(config: &ServiceConfig, input: P) -> Result<Prediction> {
    let record = load_record(input)?;
    let service = InferenceService::new(config.model_store());
    let prediction = service
        .predict_detailed(&record)
        .context("Prediction failed")?;
    Ok(prediction)
}

//! End-to-end training: dataset file in, fitted bundle out.
use std::path::{Path, PathBuf};

use crate::codec::{encode_rows, fit_category_map};
use crate::config::TrainingConfig;
use crate::data_handling::{class_counts, stratified_split, Label, ThyroidDataset};
use crate::error::{PredictionError, Result};
use crate::io::load_dataset;
use crate::models::factory::build_model;
use crate::oversampling::Smote;
use crate::preprocessing::{fit_scaler, transform_matrix};
use crate::stats::{evaluate, ClassificationReport};
use crate::store::{BundleTrainer, ModelArtifactBundle};

/// Row counts observed along the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainingSummary {
    pub dataset_rows: usize,
    pub dropped_rows: usize,
    pub train_rows: usize,
    pub resampled_train_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ModelArtifactBundle,
    pub report: ClassificationReport,
    pub summary: TrainingSummary,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load `dataset_path` and train a bundle from it.
    pub fn train<P: AsRef<Path>>(&self, dataset_path: P) -> Result<TrainingOutcome> {
        let dataset_path = dataset_path.as_ref();
        log::info!("Loading training data from {}", dataset_path.display());
        let dataset = load_dataset(dataset_path)?;
        self.train_dataset(dataset)
    }

    pub fn train_dataset(&self, mut dataset: ThyroidDataset) -> Result<TrainingOutcome> {
        let mut summary = TrainingSummary {
            dataset_rows: dataset.len(),
            ..TrainingSummary::default()
        };
        dataset.log_summary();

        summary.dropped_rows = dataset.drop_non_finite_rows();
        if summary.dropped_rows > 0 {
            log::warn!(
                "Dropped {} rows with missing or non-finite numeric values",
                summary.dropped_rows
            );
        }

        let (benign, malignant) = dataset.class_counts();
        if benign == 0 || malignant == 0 {
            return Err(PredictionError::Training(format!(
                "both classes are required, found {} benign and {} malignant rows",
                benign, malignant
            )));
        }

        let category_map = fit_category_map(&dataset.rows)?;
        let encoded = encode_rows(&dataset.rows, &category_map)?;

        let split = stratified_split(&dataset.labels, self.config.test_fraction, self.config.seed)?;
        let pick = |idx: &[usize]| -> Vec<Label> { idx.iter().map(|&i| dataset.labels[i]).collect() };
        let y_train = pick(&split.train);
        let y_test = pick(&split.test);

        let scaler = fit_scaler(&encoded.select_rows(&split.train))?;
        let x_train = transform_matrix(&encoded.select_rows(&split.train), &scaler)?;
        let x_test = transform_matrix(&encoded.select_rows(&split.test), &scaler)?;
        summary.train_rows = x_train.nrows();
        summary.test_rows = x_test.nrows();

        let (x_balanced, y_balanced) = Smote::new(self.config.smote_neighbors, self.config.seed)
            .fit_resample(&x_train, &y_train)?;
        summary.resampled_train_rows = x_balanced.nrows();

        let (b, m) = class_counts(&y_balanced);
        log::info!(
            "Train split: {} rows, {} after SMOTE ({} benign, {} malignant); test split: {} rows",
            summary.train_rows,
            summary.resampled_train_rows,
            b,
            m,
            summary.test_rows
        );

        let mut classifier = build_model(self.config.model.clone());
        log::info!("Training {} classifier", classifier.name());
        classifier.fit(&x_balanced, &y_balanced)?;

        let predicted = classifier.predict(&x_test)?;
        let report = evaluate(&y_test, &predicted);
        log::info!("Test split metrics: {}", report);

        let bundle = ModelArtifactBundle::new(
            classifier,
            category_map,
            scaler,
            self.config.model.clone(),
            Some(report),
        );

        Ok(TrainingOutcome {
            bundle,
            report,
            summary,
        })
    }

    /// Bind the pipeline to a dataset so a `ModelStore` can train on demand.
    pub fn into_trainer<P: Into<PathBuf>>(self, dataset_path: P) -> DatasetTrainer {
        DatasetTrainer {
            pipeline: self,
            dataset_path: dataset_path.into(),
        }
    }
}

/// `BundleTrainer` reading a fixed dataset path.
#[derive(Debug, Clone)]
pub struct DatasetTrainer {
    pipeline: TrainingPipeline,
    dataset_path: PathBuf,
}

impl DatasetTrainer {
    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }
}

impl BundleTrainer for DatasetTrainer {
    fn train_bundle(&self) -> Result<ModelArtifactBundle> {
        Ok(self.pipeline.train(&self.dataset_path)?.bundle)
    }
}

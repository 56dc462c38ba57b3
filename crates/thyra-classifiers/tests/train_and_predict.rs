//! Training pipeline and inference against a synthetic dataset.

mod common;

use std::fs;
use std::sync::Arc;

use thyra_classifiers::codec::{encode_record, EncodedFeatureVector};
use thyra_classifiers::config::ArtifactConfig;
use thyra_classifiers::data_handling::FEATURE_WIDTH;
use thyra_classifiers::inference::{predict_with_bundle, InferenceService};
use thyra_classifiers::pipeline::TrainingPipeline;
use thyra_classifiers::preprocessing::transform;
use thyra_classifiers::store::ModelStore;
use thyra_classifiers::{Label, PredictionError};

use common::{example_record, init_logging, quick_training_config, write_dataset};

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[test]
fn pipeline_reports_split_and_metrics() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let dataset = write_dataset(tmp.path(), 400, 1);

    let outcome = TrainingPipeline::new(quick_training_config())
        .train(&dataset)
        .unwrap();
    let summary = outcome.summary;

    assert_eq!(summary.dataset_rows, 400);
    assert_eq!(summary.dropped_rows, 0);
    // 100 malignant / 300 benign, 20% of each held out
    assert_eq!(summary.test_rows, 80);
    assert_eq!(summary.train_rows, 320);
    // SMOTE brings 80 malignant up to 240
    assert_eq!(summary.resampled_train_rows, 480);

    assert_eq!(outcome.report.support(), 80);
    assert!(
        outcome.report.accuracy > 0.9,
        "nodule size separates the classes: {}",
        outcome.report
    );
    assert_eq!(outcome.bundle.manifest.feature_width, FEATURE_WIDTH);
    assert_eq!(outcome.bundle.manifest.metrics, Some(outcome.report));
}

#[test]
fn oversampling_leaves_test_split_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset = write_dataset(tmp.path(), 200, 2);

    let outcome = TrainingPipeline::new(quick_training_config())
        .train(&dataset)
        .unwrap();
    let summary = outcome.summary;
    let report = outcome.report;

    // 50 malignant / 150 benign: 10 + 30 held out
    assert_eq!(summary.test_rows, 40);
    assert_eq!(report.support(), 40);
    // no synthetic malignant rows reached the evaluation
    assert_eq!(report.true_positives + report.false_negatives, 10);
    assert_eq!(report.true_negatives + report.false_positives, 30);
    assert!(summary.resampled_train_rows > summary.train_rows);
}

#[test]
fn rows_with_unparseable_numbers_are_dropped() {
    let tmp = tempfile::tempdir().unwrap();
    let mut csv = common::dataset_csv(120, 3);
    csv.push_str("999,n/a,Male,Japan,Asian,No,No,No,No,No,No,1.0,1.0,6.0,1.0,Low,Benign\n");
    let path = tmp.path().join("with_nan.csv");
    fs::write(&path, csv).unwrap();

    let summary = TrainingPipeline::new(quick_training_config())
        .train(&path)
        .unwrap()
        .summary;
    assert_eq!(summary.dataset_rows, 121);
    assert_eq!(summary.dropped_rows, 1);
}

#[test]
fn single_class_dataset_fails_to_train() {
    let tmp = tempfile::tempdir().unwrap();
    let csv: String = common::dataset_csv(80, 4)
        .lines()
        .filter(|line| !line.ends_with("Malignant"))
        .map(|line| format!("{}\n", line))
        .collect();
    let path = tmp.path().join("benign_only.csv");
    fs::write(&path, csv).unwrap();

    let err = TrainingPipeline::new(quick_training_config())
        .train(&path)
        .unwrap_err();
    assert!(matches!(err, PredictionError::Training(_)), "{}", err);
}

#[test]
fn missing_dataset_is_a_dataset_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = TrainingPipeline::new(quick_training_config())
        .train(tmp.path().join("nope.csv"))
        .unwrap_err();
    assert!(matches!(err, PredictionError::Dataset(_)), "{}", err);
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

fn service(tmp: &tempfile::TempDir) -> InferenceService {
    let dataset = write_dataset(tmp.path(), 240, 5);
    let trainer = TrainingPipeline::new(quick_training_config()).into_trainer(dataset);
    let store = ModelStore::new(
        ArtifactConfig::with_dir(tmp.path().join("artifacts")),
        Arc::new(trainer),
    );
    InferenceService::new(Arc::new(store))
}

#[test]
fn example_record_gets_a_label() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let service = service(&tmp);

    let prediction = service.predict_detailed(&example_record()).unwrap();
    assert!((0.0..=1.0).contains(&prediction.probability));
    assert_eq!(
        prediction.label == Label::Malignant,
        prediction.probability >= 0.5
    );
}

#[test]
fn repeated_prediction_is_stable() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service(&tmp);
    let record = example_record();

    let first = service.predict(&record).unwrap();
    let second = service.predict(&record).unwrap();
    assert_eq!(first, second);
}

#[test]
fn large_nodule_is_predicted_malignant() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service(&tmp);

    let mut record = example_record();
    record.nodule_size = 4.5;
    assert_eq!(service.predict(&record).unwrap(), Label::Malignant);
    record.nodule_size = 0.5;
    record.thyroid_cancer_risk = "Low".into();
    assert_eq!(service.predict(&record).unwrap(), Label::Benign);
}

#[test]
fn unseen_gender_fails_the_request() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service(&tmp);

    let mut record = example_record();
    record.gender = "Unknown".into();
    match service.predict(&record) {
        Err(PredictionError::UnknownCategory { column, value }) => {
            assert_eq!(column, "Gender");
            assert_eq!(value, "Unknown");
        }
        other => panic!("expected UnknownCategory, got {:?}", other),
    }
    assert!(service.predict(&record).unwrap_err().is_invalid_input());

    // the service keeps answering valid requests
    assert!(service.predict(&example_record()).is_ok());
}

#[test]
fn non_finite_numeric_fails_the_request() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service(&tmp);

    let mut record = example_record();
    record.tsh_level = f64::INFINITY;
    assert!(matches!(
        service.predict(&record),
        Err(PredictionError::NonFiniteFeature { column }) if column == "TSH_Level"
    ));
}

#[test]
fn scaled_width_matches_fit_width() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service(&tmp);
    let bundle = service.store().load_or_train().unwrap();

    let encoded = encode_record(&example_record(), &bundle.category_map).unwrap();
    let scaled = transform(&encoded, &bundle.scaler).unwrap();
    assert_eq!(scaled.len(), bundle.scaler.width());
    assert_eq!(scaled.len(), FEATURE_WIDTH);

    let short = EncodedFeatureVector::new(vec![0.0; FEATURE_WIDTH - 1]);
    assert!(matches!(
        transform(&short, &bundle.scaler),
        Err(PredictionError::DimensionMismatch {
            expected: FEATURE_WIDTH,
            actual
        }) if actual == FEATURE_WIDTH - 1
    ));

    let direct = predict_with_bundle(&bundle, &example_record()).unwrap();
    assert_eq!(direct, service.predict_detailed(&example_record()).unwrap());
}

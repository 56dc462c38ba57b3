//! Synthetic thyroid dataset shared by the integration tests.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use thyra_classifiers::config::{ModelConfig, ModelType, TrainingConfig};
use thyra_classifiers::RawFeatureRecord;

pub const HEADER: &str = "Patient_ID,Age,Gender,Country,Ethnicity,Family_History,Radiation_Exposure,Iodine_Deficiency,Smoking,Obesity,Diabetes,TSH_Level,T3_Level,T4_Level,Nodule_Size,Thyroid_Cancer_Risk,Diagnosis";

fn yes_no(rng: &mut ChaCha8Rng) -> &'static str {
    if rng.gen_bool(0.5) {
        "Yes"
    } else {
        "No"
    }
}

/// CSV text with `rows` patients; roughly a quarter are malignant, and
/// malignant nodules are larger.
pub fn dataset_csv(rows: usize, seed: u64) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut csv = String::from(HEADER);
    csv.push('\n');

    for i in 0..rows {
        let malignant = i % 4 == 0;
        let gender = if i % 2 == 0 { "Female" } else { "Male" };
        let nodule: f64 = if malignant {
            rng.gen_range(2.5..5.0)
        } else {
            rng.gen_range(0.0..2.5)
        };
        let risk = if malignant {
            if rng.gen_bool(0.7) {
                "High"
            } else {
                "Medium"
            }
        } else {
            ["Low", "Medium", "High"][i % 3]
        };
        let _ = writeln!(
            csv,
            "{},{},{},Japan,Asian,{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{},{}",
            i + 1,
            rng.gen_range(18..80),
            gender,
            yes_no(&mut rng),
            yes_no(&mut rng),
            yes_no(&mut rng),
            yes_no(&mut rng),
            yes_no(&mut rng),
            yes_no(&mut rng),
            rng.gen_range(0.1..10.0),
            rng.gen_range(0.5..3.5),
            rng.gen_range(4.5..12.0),
            nodule,
            risk,
            if malignant { "Malignant" } else { "Benign" }
        );
    }
    csv
}

pub fn write_dataset(dir: &Path, rows: usize, seed: u64) -> PathBuf {
    let path = dir.join("thyroid_cancer_risk_data.csv");
    fs::write(&path, dataset_csv(rows, seed)).expect("failed to write dataset");
    path
}

/// Small, fast classifier settings for tests.
pub fn quick_training_config() -> TrainingConfig {
    TrainingConfig {
        model: ModelConfig::new(
            0.3,
            ModelType::GBDT {
                max_depth: 3,
                num_boost_round: 15,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            },
        ),
        ..TrainingConfig::default()
    }
}

pub fn example_record() -> RawFeatureRecord {
    RawFeatureRecord {
        age: 45,
        gender: "Female".into(),
        family_history: "Yes".into(),
        radiation_exposure: "No".into(),
        iodine_deficiency: "No".into(),
        smoking: "No".into(),
        obesity: "No".into(),
        diabetes: "No".into(),
        tsh_level: 2.5,
        t3_level: 1.2,
        t4_level: 6.0,
        nodule_size: 1.8,
        thyroid_cancer_risk: "High".into(),
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

//! Fixtures shared by the CLI and HTTP tests.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use thyra_cli::config::ServiceConfig;
use thyra_classifiers::config::{ArtifactConfig, ModelConfig, ModelType, TrainingConfig};
use thyra_classifiers::RawFeatureRecord;

const HEADER: &str = "Patient_ID,Age,Gender,Country,Ethnicity,Family_History,Radiation_Exposure,Iodine_Deficiency,Smoking,Obesity,Diabetes,TSH_Level,T3_Level,T4_Level,Nodule_Size,Thyroid_Cancer_Risk,Diagnosis";

/// Deterministic dataset where every fourth patient is malignant and has a
/// larger nodule.
pub fn write_dataset(dir: &Path, rows: usize) -> PathBuf {
    let yes_no = |v: usize| if v % 2 == 0 { "Yes" } else { "No" };
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for i in 0..rows {
        let malignant = i % 4 == 0;
        let jitter = (i * 37 % 100) as f64 / 100.0;
        let nodule = if malignant { 2.8 + 2.0 * jitter } else { 2.2 * jitter };
        let risk = if malignant {
            ["High", "Medium"][(i / 4) % 2]
        } else {
            ["Low", "Medium", "High"][i % 3]
        };
        let _ = writeln!(
            csv,
            "{},{},{},Japan,Asian,{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{},{}",
            i + 1,
            20 + i * 7 % 60,
            if i % 3 == 0 { "Female" } else { "Male" },
            yes_no(i / 2),
            yes_no(i / 3),
            yes_no(i / 5),
            yes_no(i / 7),
            yes_no(i / 11),
            yes_no(i / 13),
            0.5 + 9.0 * jitter,
            0.8 + 2.5 * ((i * 53 % 100) as f64 / 100.0),
            4.5 + 7.0 * ((i * 71 % 100) as f64 / 100.0),
            nodule,
            risk,
            if malignant { "Malignant" } else { "Benign" }
        );
    }
    let path = dir.join("thyroid_cancer_risk_data.csv");
    fs::write(&path, csv).expect("failed to write dataset");
    path
}

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

/// Config rooted in `dir` with a 200-row dataset and a fast classifier.
pub fn service_config(dir: &Path) -> ServiceConfig {
    let mut config = ServiceConfig {
        dataset_path: write_dataset(dir, 200),
        artifacts: ArtifactConfig::with_dir(dir.join("artifacts")),
        training: quick_training_config(),
        ..ServiceConfig::default()
    };
    config.server.database = dir.join("history.db");
    config
}

pub fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("thyra.json");
    let config = service_config(dir);
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
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

pub fn example_json() -> serde_json::Value {
    json!({
        "age": 45,
        "gender": "Female",
        "family_history": "Yes",
        "radiation_exposure": "No",
        "iodine_deficiency": "No",
        "smoking": "No",
        "obesity": "No",
        "diabetes": "No",
        "tsh_level": 2.5,
        "t3_level": 1.2,
        "t4_level": 6.0,
        "nodule_size": 1.8,
        "thyroid_cancer_risk": "High"
    })
}

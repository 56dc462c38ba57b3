use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Classifier hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 100,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        }
    }
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::GBDT { .. } => "gbdt",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            _ => Err(format!("Unknown model type: {}. Supported: gbdt", s)),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

/// Settings for one training run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of each class held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the split and the oversampler.
    pub seed: u64,
    pub smote_neighbors: usize,
    pub model: ModelConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            smote_neighbors: 5,
            model: ModelConfig::default(),
        }
    }
}

/// Where the model bundle lives on disk.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ArtifactConfig {
    pub dir: PathBuf,
    pub manifest_file: String,
    pub classifier_file: String,
    pub category_map_file: String,
    pub scaler_file: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            manifest_file: "manifest.json".to_string(),
            classifier_file: "classifier.json".to_string(),
            category_map_file: "category_map.json".to_string(),
            scaler_file: "scaler.json".to_string(),
        }
    }
}

impl ArtifactConfig {
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn current_file(&self) -> PathBuf {
        self.dir.join("CURRENT")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.dir.join("versions")
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    /// All bundle file names, in the order they are written.
    pub fn bundle_files(&self) -> [&str; 4] {
        [
            &self.classifier_file,
            &self.category_map_file,
            &self.scaler_file,
            &self.manifest_file,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_config_round_trips_through_json() {
        let config = ModelConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"GBDT\""), "{}", json);
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_training_config_uses_defaults() {
        let config: TrainingConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn artifact_paths_nest_under_dir() {
        let config = ArtifactConfig::with_dir("/tmp/models");
        assert_eq!(config.current_file(), PathBuf::from("/tmp/models/CURRENT"));
        assert_eq!(
            config.version_dir("abc"),
            PathBuf::from("/tmp/models/versions/abc")
        );
    }

    #[test]
    fn unknown_model_type_is_rejected() {
        assert!("gbdt".parse::<ModelType>().is_ok());
        assert!("svm".parse::<ModelType>().is_err());
    }
}

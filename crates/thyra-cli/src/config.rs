use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use thyra_classifiers::config::{ArtifactConfig, TrainingConfig};
use thyra_classifiers::inference::InferenceService;
use thyra_classifiers::pipeline::TrainingPipeline;
use thyra_classifiers::store::ModelStore;

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// SQLite file holding prediction history.
    pub database: PathBuf,
    pub history_limit: usize,
    /// How long a request may wait for the model (including a cold-start
    /// training run) before answering 503.
    pub training_timeout_secs: u64,
    /// Load or train the model before accepting requests.
    pub warm_up: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            database: PathBuf::from("thyroid_predictions.db"),
            history_limit: 10,
            training_timeout_secs: 600,
            warm_up: true,
        }
    }
}

/// Top-level configuration shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub dataset_path: PathBuf,
    pub artifacts: ArtifactConfig,
    pub training: TrainingConfig,
    pub server: ServerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/thyroid_cancer_risk_data.csv"),
            artifacts: ArtifactConfig::default(),
            training: TrainingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// String argument `id` if the subcommand defines it and it was given.
fn override_arg<'a>(matches: &'a ArgMatches, id: &str) -> Option<&'a String> {
    matches.try_get_one::<String>(id).ok().flatten()
}

impl ServiceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServiceConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Read the optional `config` argument and apply command line overrides.
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let config_path = matches.try_get_one::<PathBuf>("config").ok().flatten();

        let mut config = match config_path {
            Some(path) => {
                log::info!("Using config: {}", path.display());
                ServiceConfig::load(path)?
            }
            None => {
                let config = ServiceConfig::default();
                let default_json = serde_json::to_string_pretty(&config).unwrap_or_default();
                eprintln!("[thyra] No config provided; using defaults:\n{}", default_json);
                config
            }
        };

        if let Some(dataset) = override_arg(matches, "dataset") {
            config.dataset_path = PathBuf::from(dataset);
        }
        if let Some(artifacts) = override_arg(matches, "artifacts") {
            config.artifacts.dir = PathBuf::from(artifacts);
        }
        if let Some(bind) = override_arg(matches, "bind") {
            config.server.bind = bind.clone();
        }
        if let Some(database) = override_arg(matches, "database") {
            config.server.database = PathBuf::from(database);
        }

        Ok(config)
    }

    pub fn training_timeout(&self) -> Duration {
        Duration::from_secs(self.server.training_timeout_secs)
    }

    /// Model store that trains from `dataset_path` when no bundle exists.
    pub fn model_store(&self) -> Arc<ModelStore> {
        let trainer = TrainingPipeline::new(self.training.clone()).into_trainer(&self.dataset_path);
        Arc::new(ModelStore::new(self.artifacts.clone(), Arc::new(trainer)))
    }

    pub fn inference_service(&self) -> Arc<InferenceService> {
        Arc::new(InferenceService::new(self.model_store()))
    }
}

//! On-disk model bundle with a train-or-load entry point.
//!
//! A bundle is written as a new version directory and becomes active only
//! when the `CURRENT` pointer file is replaced, so readers see either the
//! previous bundle or the new one, never a mix.
//!
//! Saves and cold-start training on one directory are serialized within a
//! process. Concurrent saves from separate processes are not supported.
//!
//! ```text
//! <dir>/CURRENT
//! <dir>/versions/<version>/{manifest,classifier,category_map,scaler}.json
//! ```
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::CategoryMap;
use crate::config::{ArtifactConfig, ModelConfig};
use crate::data_handling::{feature_names, FEATURE_WIDTH};
use crate::error::{PredictionError, Result};
use crate::models::factory::restore_model;
use crate::models::ClassifierModel;
use crate::preprocessing::ScalerStats;
use crate::stats::ClassificationReport;

/// Metadata written next to the fitted parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub model_type: String,
    /// Hyper-parameters needed to restore the classifier.
    pub model: ModelConfig,
    pub feature_names: Vec<String>,
    pub feature_width: usize,
    /// Held-out metrics from the training run, when known.
    #[serde(default)]
    pub metrics: Option<ClassificationReport>,
}

/// Everything inference needs: classifier, category codes and scaler.
pub struct ModelArtifactBundle {
    pub manifest: BundleManifest,
    pub classifier: Box<dyn ClassifierModel>,
    pub category_map: CategoryMap,
    pub scaler: ScalerStats,
}

impl ModelArtifactBundle {
    /// Assemble a freshly trained bundle under a new version id.
    pub fn new(
        classifier: Box<dyn ClassifierModel>,
        category_map: CategoryMap,
        scaler: ScalerStats,
        model: ModelConfig,
        metrics: Option<ClassificationReport>,
    ) -> Self {
        let manifest = BundleManifest {
            version: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            model_type: classifier.name().to_string(),
            model,
            feature_names: feature_names(),
            feature_width: scaler.width(),
            metrics,
        };
        Self {
            manifest,
            classifier,
            category_map,
            scaler,
        }
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Check that every part agrees on the feature layout.
    pub fn validate(&self) -> Result<()> {
        self.category_map.validate()?;
        self.scaler.validate()?;
        if self.manifest.feature_width != FEATURE_WIDTH
            || self.scaler.width() != FEATURE_WIDTH
            || self.manifest.feature_names != feature_names()
        {
            return Err(PredictionError::CorruptArtifact(format!(
                "bundle {} feature layout (manifest width {}, scaler width {}) does not match the {} schema columns",
                self.manifest.version,
                self.manifest.feature_width,
                self.scaler.width(),
                FEATURE_WIDTH
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ModelArtifactBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifactBundle")
            .field("manifest", &self.manifest)
            .field("classifier", &self.classifier.name())
            .field("category_map", &self.category_map)
            .field("scaler", &self.scaler)
            .finish()
    }
}

/// Produces a new bundle when the store has none.
pub trait BundleTrainer: Send + Sync {
    fn train_bundle(&self) -> Result<ModelArtifactBundle>;
}

enum BundleState {
    Absent,
    Present(Arc<ModelArtifactBundle>),
}

/// Train-then-persist-then-load runs under one lock per artifact directory,
/// shared by every store in the process.
fn training_guard(dir: &Path) -> Arc<Mutex<()>> {
    static GUARDS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

    let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    let mut guards = GUARDS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(guards.entry(key).or_default())
}

pub struct ModelStore {
    config: ArtifactConfig,
    trainer: Arc<dyn BundleTrainer>,
    state: RwLock<BundleState>,
}

impl ModelStore {
    pub fn new(config: ArtifactConfig, trainer: Arc<dyn BundleTrainer>) -> Self {
        Self {
            config,
            trainer,
            state: RwLock::new(BundleState::Absent),
        }
    }

    pub fn config(&self) -> &ArtifactConfig {
        &self.config
    }

    /// Whether a bundle is cached in memory.
    pub fn is_loaded(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            BundleState::Present(_)
        )
    }

    /// Whether a complete bundle is active on disk.
    pub fn exists(&self) -> bool {
        match self.current_version() {
            Ok(version) => {
                let dir = self.config.version_dir(&version);
                self.config
                    .bundle_files()
                    .iter()
                    .all(|name| dir.join(name).is_file())
            }
            Err(_) => false,
        }
    }

    fn current_version(&self) -> Result<String> {
        let current = self.config.current_file();
        if !current.is_file() {
            return Err(PredictionError::ArtifactNotFound { path: current });
        }
        let version = fs::read_to_string(&current)?.trim().to_string();
        if version.is_empty()
            || version == "."
            || version == ".."
            || version.contains(['/', '\\'])
        {
            return Err(PredictionError::CorruptArtifact(format!(
                "invalid bundle version '{}' in {}",
                version,
                current.display()
            )));
        }
        Ok(version)
    }

    /// Read the active bundle from disk.
    pub fn load(&self) -> Result<ModelArtifactBundle> {
        let version = self.current_version()?;
        let dir = self.config.version_dir(&version);

        for name in self.config.bundle_files() {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(PredictionError::ArtifactNotFound { path });
            }
        }

        let manifest: BundleManifest = read_json(&dir.join(&self.config.manifest_file))?;
        if manifest.version != version {
            return Err(PredictionError::CorruptArtifact(format!(
                "manifest version {} does not match CURRENT {}",
                manifest.version, version
            )));
        }
        let category_map: CategoryMap = read_json(&dir.join(&self.config.category_map_file))?;
        let scaler: ScalerStats = read_json(&dir.join(&self.config.scaler_file))?;
        let classifier_json = fs::read_to_string(dir.join(&self.config.classifier_file))?;
        let classifier = restore_model(manifest.model.clone(), &classifier_json)?;

        let bundle = ModelArtifactBundle {
            manifest,
            classifier,
            category_map,
            scaler,
        };
        bundle.validate()?;

        log::info!(
            "Loaded model bundle {} ({}, created {})",
            bundle.manifest.version,
            bundle.manifest.model_type,
            bundle.manifest.created_at
        );
        Ok(bundle)
    }

    /// Persist `bundle` and make it the active one.
    pub fn save(&self, bundle: &ModelArtifactBundle) -> Result<()> {
        fs::create_dir_all(&self.config.dir)?;
        let guard = training_guard(&self.config.dir);
        let _lock = guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.save_locked(bundle)
    }

    /// `save` for callers already holding the directory guard.
    fn save_locked(&self, bundle: &ModelArtifactBundle) -> Result<()> {
        bundle.validate()?;

        let version = bundle.version();
        let dir = self.config.version_dir(version);
        fs::create_dir_all(&dir)?;

        write_atomic(
            &dir.join(&self.config.classifier_file),
            bundle.classifier.to_json()?.as_bytes(),
        )?;
        write_atomic(
            &dir.join(&self.config.category_map_file),
            &serde_json::to_vec_pretty(&bundle.category_map)?,
        )?;
        write_atomic(
            &dir.join(&self.config.scaler_file),
            &serde_json::to_vec_pretty(&bundle.scaler)?,
        )?;
        write_atomic(
            &dir.join(&self.config.manifest_file),
            &serde_json::to_vec_pretty(&bundle.manifest)?,
        )?;

        // The bundle becomes visible here.
        write_atomic(&self.config.current_file(), version.as_bytes())?;
        log::info!(
            "Saved model bundle {} to {}",
            version,
            self.config.dir.display()
        );

        self.prune_versions(version);
        Ok(())
    }

    /// Remove complete versions other than `keep` and the one `CURRENT` names.
    fn prune_versions(&self, keep: &str) {
        let current = self.current_version().ok();
        let entries = match fs::read_dir(self.config.versions_dir()) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Could not list old bundle versions: {}", e);
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name == keep || current.as_deref().is_some_and(|c| name == c) {
                continue;
            }
            let path = entry.path();
            // no manifest yet: possibly a save still in progress
            if !path.join(&self.config.manifest_file).is_file() {
                continue;
            }
            if let Err(e) = fs::remove_dir_all(&path) {
                log::warn!("Could not remove stale bundle {}: {}", path.display(), e);
            } else {
                log::debug!("Removed stale bundle {}", path.display());
            }
        }
    }

    /// Return the active bundle, training and saving one first if none exists.
    ///
    /// Concurrent callers on a cold start wait for a single training run and
    /// all receive the same bundle.
    pub fn load_or_train(&self) -> Result<Arc<ModelArtifactBundle>> {
        if let Some(bundle) = self.cached() {
            return Ok(bundle);
        }

        fs::create_dir_all(&self.config.dir)?;
        let guard = training_guard(&self.config.dir);
        let _lock = guard.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited.
        if let Some(bundle) = self.cached() {
            return Ok(bundle);
        }

        if !self.exists() {
            log::info!(
                "No model bundle in {}; training a new one",
                self.config.dir.display()
            );
            let trained = self.trainer.train_bundle()?;
            self.save_locked(&trained)?;
        }

        let bundle = Arc::new(self.load()?);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            BundleState::Present(Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Forget the cached bundle; the next `load_or_train` re-reads disk.
    pub fn reload(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = BundleState::Absent;
    }

    fn cached(&self) -> Option<Arc<ModelArtifactBundle>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            BundleState::Present(bundle) => Some(Arc::clone(bundle)),
            BundleState::Absent => None,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        PredictionError::CorruptArtifact(format!("failed to parse {}: {}", path.display(), e))
    })
}

/// Write to a sibling temp file, flush it to disk, then rename over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverTrains;

    impl BundleTrainer for NeverTrains {
        fn train_bundle(&self) -> Result<ModelArtifactBundle> {
            Err(PredictionError::Training("no training in this test".into()))
        }
    }

    fn store(dir: &Path) -> ModelStore {
        ModelStore::new(ArtifactConfig::with_dir(dir), Arc::new(NeverTrains))
    }

    #[test]
    fn empty_dir_has_no_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        assert!(!store.exists());
        assert!(matches!(
            store.load(),
            Err(PredictionError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn failed_training_leaves_store_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        assert!(store.load_or_train().is_err());
        assert!(!store.is_loaded());
        assert!(!store.config().current_file().exists());
    }

    #[test]
    fn path_like_version_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        fs::write(store.config().current_file(), "../elsewhere").unwrap();
        assert!(matches!(
            store.load(),
            Err(PredictionError::CorruptArtifact(_))
        ));
    }

    #[test]
    fn prune_spares_current_and_unfinished_versions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let config = store.config();
        for version in ["mine", "current", "stale", "unfinished"] {
            fs::create_dir_all(config.version_dir(version)).unwrap();
        }
        for version in ["mine", "current", "stale"] {
            fs::write(config.version_dir(version).join(&config.manifest_file), "{}").unwrap();
        }
        fs::write(config.current_file(), "current").unwrap();

        store.prune_versions("mine");

        assert!(config.version_dir("mine").is_dir());
        assert!(config.version_dir("current").is_dir());
        assert!(config.version_dir("unfinished").is_dir());
        assert!(!config.version_dir("stale").exists());
    }

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("CURRENT");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}

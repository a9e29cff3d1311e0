//! Checkpoint persistence for per-fold model parameters
//!
//! A checkpoint is keyed by (model tag, fold index) and lives at
//! `<dir>/best_param_<tag>_<fold>.json`. Its existence alone decides whether a
//! fold is trained or restored. Stored checkpoints are never invalidated
//! automatically: a record written for a different feature layout is only
//! detected through the feature fingerprint stored alongside the parameters.

use crate::error::{Result, TrainerError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Identity of the feature layout a model was trained on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFingerprint {
    pub n_features: usize,
    pub digest: String,
}

impl FeatureFingerprint {
    pub fn from_names(names: &[String]) -> Self {
        let mut hasher = Sha256::new();
        for name in names {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        Self {
            n_features: names.len(),
            digest: format!("{:x}", hasher.finalize()),
        }
    }
}

/// A persisted parameter snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord<P> {
    pub model: String,
    pub fold: usize,
    /// Epoch (or boosting round) the snapshot was taken at
    pub epoch: Option<usize>,
    /// Monitored validation loss at that point
    pub monitor: Option<f64>,
    pub features: FeatureFingerprint,
    pub saved_at: DateTime<Utc>,
    pub params: P,
}

/// Directory holding checkpoints for one or more pipelines
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a (tag, fold) pair
    pub fn file_name(tag: &str, fold: usize) -> String {
        format!("best_param_{}_{}.json", tag, fold)
    }

    /// Handle to the checkpoint of one fold
    pub fn slot(&self, tag: &str, fold: usize, features: FeatureFingerprint) -> CheckpointSlot {
        CheckpointSlot {
            path: self.dir.join(Self::file_name(tag, fold)),
            tag: tag.to_string(),
            fold,
            features,
        }
    }
}

/// Checkpoint location of a single (model, fold) pair
#[derive(Debug, Clone)]
pub struct CheckpointSlot {
    path: PathBuf,
    tag: String,
    fold: usize,
    features: FeatureFingerprint,
}

impl CheckpointSlot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fold(&self) -> usize {
        self.fold
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn error(&self, reason: impl Into<String>) -> TrainerError {
        TrainerError::CheckpointError {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Persist a snapshot, replacing any previous one atomically
    pub fn save<P: Serialize>(&self, params: &P, epoch: Option<usize>, monitor: Option<f64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = CheckpointRecord {
            model: self.tag.clone(),
            fold: self.fold,
            epoch,
            monitor,
            features: self.features.clone(),
            saved_at: Utc::now(),
            params,
        };
        let json = serde_json::to_vec(&record)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), ?epoch, ?monitor, "Checkpoint saved");
        Ok(())
    }

    /// Load the stored snapshot and check it against the current feature layout
    pub fn load<P: DeserializeOwned>(&self) -> Result<CheckpointRecord<P>> {
        let bytes = fs::read(&self.path)?;
        let record: CheckpointRecord<P> = serde_json::from_slice(&bytes)
            .map_err(|e| self.error(format!("unreadable checkpoint: {}", e)))?;

        if record.model != self.tag || record.fold != self.fold {
            return Err(self.error(format!(
                "checkpoint belongs to {} fold {}",
                record.model, record.fold
            )));
        }
        if record.features.n_features != self.features.n_features {
            return Err(self.error(format!(
                "checkpoint was trained on {} features, data has {}",
                record.features.n_features, self.features.n_features
            )));
        }
        if record.features.digest != self.features.digest {
            warn!(
                path = %self.path.display(),
                "Checkpoint feature names differ from the current data; it may be stale"
            );
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_file_name_pattern() {
        assert_eq!(CheckpointStore::file_name("fnn", 3), "best_param_fnn_3.json");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("ckpt"));
        let fp = FeatureFingerprint::from_names(&names(&["a", "b"]));
        let slot = store.slot("fnn", 0, fp);

        assert!(!slot.exists());
        slot.save(&vec![1.0, 2.5], Some(4), Some(0.31)).unwrap();
        assert!(slot.exists());

        let record: CheckpointRecord<Vec<f64>> = slot.load().unwrap();
        assert_eq!(record.params, vec![1.0, 2.5]);
        assert_eq!(record.epoch, Some(4));
        assert_eq!(record.fold, 0);
        assert_eq!(record.model, "fnn");
    }

    #[test]
    fn test_feature_count_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store
            .slot("pnn", 1, FeatureFingerprint::from_names(&names(&["a", "b"])))
            .save(&0u8, None, None)
            .unwrap();

        let wider = store.slot("pnn", 1, FeatureFingerprint::from_names(&names(&["a", "b", "c"])));
        let err = wider.load::<u8>().unwrap_err();
        assert!(matches!(err, TrainerError::CheckpointError { .. }));
    }

    #[test]
    fn test_renamed_features_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store
            .slot("fnn", 2, FeatureFingerprint::from_names(&names(&["a", "b"])))
            .save(&7u32, None, None)
            .unwrap();

        let renamed = store.slot("fnn", 2, FeatureFingerprint::from_names(&names(&["x", "y"])));
        assert_eq!(renamed.load::<u32>().unwrap().params, 7);
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let a = FeatureFingerprint::from_names(&names(&["a", "b"]));
        let b = FeatureFingerprint::from_names(&names(&["b", "a"]));
        let ab = FeatureFingerprint::from_names(&names(&["ab"]));
        assert_ne!(a.digest, b.digest);
        assert_ne!(a.digest, ab.digest);
    }
}

//! Persistent artifact store with train-on-miss loading.
//!
//! Layout:
//!
//! ```text
//! <artifacts_dir>/CURRENT                       name of the live generation
//! <artifacts_dir>/gen-<time>-<id>/classifier.json
//! <artifacts_dir>/gen-<time>-<id>/scaler.json
//! <artifacts_dir>/gen-<time>-<id>/metadata.json
//! ```
//!
//! A generation directory is complete before `CURRENT` names it, and
//! `CURRENT` is replaced by a single rename. Superseded generations are
//! removed only after the pointer has moved away from them, so a reader that
//! loses a file mid-read sees the pointer change and retries on the new
//! generation. A file missing while the pointer still names its generation is
//! genuine partial presence.

use crate::error::ArtifactError;
use crate::models::artifacts::{ArtifactSet, LinearClassifier, ModelMetadata, StandardScaler};
use crate::models::trainer::{Trainer, TrainingOutcome};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const METADATA_FILE: &str = "metadata.json";
/// Pointer file naming the live generation
pub const CURRENT_FILE: &str = "CURRENT";

const ARTIFACT_FILES: [&str; 3] = [CLASSIFIER_FILE, SCALER_FILE, METADATA_FILE];
const GENERATION_PREFIX: &str = "gen-";
/// Pointer moves tolerated during one read before giving up
const MAX_READ_ATTEMPTS: usize = 32;

/// Loads, trains and persists the model artifact set
pub struct ArtifactStore {
    dir: PathBuf,
    trainer: Trainer,
    /// Serializes cold-start training and retraining within the process
    write_guard: Mutex<()>,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(dir: P, trainer: Trainer) -> Self {
        Self {
            dir: dir.into(),
            trainer,
            write_guard: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the persisted artifact set, training and persisting one if none exists.
    ///
    /// Concurrent cold-start callers train once: the first takes the write
    /// guard and trains, the rest wait and then read what it persisted.
    pub fn load(&self) -> Result<ArtifactSet, ArtifactError> {
        if let Some(artifacts) = self.read()? {
            return Ok(artifacts);
        }

        let _guard = self
            .write_guard
            .lock()
            .map_err(|e| ArtifactError::Training(format!("write guard poisoned: {e}")))?;

        if let Some(artifacts) = self.read()? {
            return Ok(artifacts);
        }

        info!(dir = %self.dir.display(), "No artifact set found, training a new model");
        let outcome = self.train_and_persist()?;
        Ok(outcome.artifacts)
    }

    /// Train unconditionally and replace the persisted set
    pub fn retrain(&self) -> Result<ArtifactSet, ArtifactError> {
        self.retrain_with_report().map(|outcome| outcome.artifacts)
    }

    /// Like [`retrain`](Self::retrain), also returning the evaluation report
    pub fn retrain_with_report(&self) -> Result<TrainingOutcome, ArtifactError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|e| ArtifactError::Training(format!("write guard poisoned: {e}")))?;

        info!(dir = %self.dir.display(), "Retraining model");
        self.train_and_persist()
    }

    fn train_and_persist(&self) -> Result<TrainingOutcome, ArtifactError> {
        let outcome = self.trainer.train()?;
        info!("Evaluation on held-out data:\n{}", outcome.evaluation);
        self.persist(&outcome.artifacts)?;
        Ok(outcome)
    }

    /// Directory of the live generation, `None` before the first persist
    pub fn current_dir(&self) -> Result<Option<PathBuf>, ArtifactError> {
        Ok(self.current_generation()?.map(|g| self.dir.join(g)))
    }

    fn current_generation(&self) -> Result<Option<String>, ArtifactError> {
        let raw = match fs::read_to_string(self.dir.join(CURRENT_FILE)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let generation = raw.trim();
        if !generation.starts_with(GENERATION_PREFIX) || generation.contains(['/', '\\']) {
            return Err(ArtifactError::Inconsistent(format!(
                "{} names an invalid generation {generation:?}",
                self.dir.join(CURRENT_FILE).display()
            )));
        }
        Ok(Some(generation.to_string()))
    }

    /// Read the live artifact set.
    ///
    /// `Ok(None)` when nothing has been persisted; [`ArtifactError::Incomplete`]
    /// when the live generation lacks some of its blobs.
    pub fn read(&self) -> Result<Option<ArtifactSet>, ArtifactError> {
        let mut attempt = 1;
        loop {
            let Some(generation) = self.current_generation()? else {
                return Ok(None);
            };

            match self.read_generation(&generation) {
                Ok(artifacts) => return Ok(Some(artifacts)),
                Err(e) => {
                    let moved = self.current_generation()?.as_deref() != Some(generation.as_str());
                    if !moved || attempt >= MAX_READ_ATTEMPTS {
                        return Err(e);
                    }
                    debug!(generation = %generation, attempt, "Generation replaced during read, retrying");
                    attempt += 1;
                }
            }
        }
    }

    fn read_generation(&self, generation: &str) -> Result<ArtifactSet, ArtifactError> {
        let dir = self.dir.join(generation);
        let missing: Vec<String> = ARTIFACT_FILES
            .iter()
            .filter(|name| !dir.join(name).is_file())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ArtifactError::Incomplete { dir, missing });
        }

        let classifier: LinearClassifier = read_json(&dir.join(CLASSIFIER_FILE))?;
        let scaler: StandardScaler = read_json(&dir.join(SCALER_FILE))?;
        let metadata: ModelMetadata = read_json(&dir.join(METADATA_FILE))?;

        info!(
            dir = %dir.display(),
            features = metadata.feature_names.len(),
            trained_at = %metadata.training_timestamp,
            "Artifact set loaded"
        );

        Ok(ArtifactSet {
            classifier,
            scaler,
            metadata,
        })
    }

    /// Write all three blobs as a new generation and publish it as one unit
    pub fn persist(&self, artifacts: &ArtifactSet) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.dir)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        let generation = format!(
            "{GENERATION_PREFIX}{}-{}",
            artifacts.metadata.training_timestamp.format("%Y%m%dT%H%M%S"),
            &id[..12]
        );
        let target = self.dir.join(&generation);
        fs::create_dir(&target)?;

        let written = write_json(&target.join(CLASSIFIER_FILE), &artifacts.classifier)
            .and_then(|_| write_json(&target.join(SCALER_FILE), &artifacts.scaler))
            .and_then(|_| write_json(&target.join(METADATA_FILE), &artifacts.metadata));
        if let Err(e) = written {
            let _ = fs::remove_dir_all(&target);
            return Err(e);
        }

        // Publish with one rename so readers never see a half-written pointer
        let pointer_tmp = self.dir.join(format!(".{CURRENT_FILE}.{id}"));
        let published = fs::write(&pointer_tmp, &generation)
            .and_then(|_| fs::rename(&pointer_tmp, self.dir.join(CURRENT_FILE)));
        if let Err(e) = published {
            let _ = fs::remove_file(&pointer_tmp);
            let _ = fs::remove_dir_all(&target);
            return Err(e.into());
        }

        self.prune(&generation);

        info!(
            dir = %target.display(),
            trained_at = %artifacts.metadata.training_timestamp,
            "Artifact set persisted"
        );
        Ok(())
    }

    /// Remove generations the pointer no longer names
    fn prune(&self, published: &str) {
        let live = self.current_generation().ok().flatten();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list artifact generations");
                return;
            }
        };

        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(GENERATION_PREFIX)
                || name == published
                || live.as_deref() == Some(name.as_str())
            {
                continue;
            }
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                warn!(generation = %name, error = %e, "Failed to remove superseded artifacts");
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::models::artifacts::fixtures::artifact_set;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn store_in(dir: &Path) -> ArtifactStore {
        let config = TrainingConfig {
            dataset_path: dir.join("missing.csv"),
            ..TrainingConfig::default()
        };
        ArtifactStore::new(dir.join("models"), Trainer::new(config))
    }

    fn generations(store: &ArtifactStore) -> Vec<String> {
        fs::read_dir(store.dir())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(GENERATION_PREFIX))
            .collect()
    }

    #[test]
    fn test_persist_then_read_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        let set = artifact_set(&["V1", "V2", "Amount"], &[0.1, -0.2, 0.3], 0.4);

        store.persist(&set).unwrap();
        let current = store.current_dir().unwrap().unwrap();
        for file in ARTIFACT_FILES {
            assert!(current.join(file).is_file());
        }
        assert_eq!(store.read().unwrap(), Some(set.clone()));
        assert_eq!(store.load().unwrap(), set);
    }

    #[test]
    fn test_persist_replaces_previous_generation() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        store.persist(&artifact_set(&["V1", "Amount"], &[1.0, 1.0], 0.0)).unwrap();
        let first = store.current_dir().unwrap().unwrap();
        let newer = artifact_set(&["V1", "V2", "Amount"], &[2.0, 0.5, 0.1], -1.0);
        store.persist(&newer).unwrap();

        assert_eq!(store.read().unwrap(), Some(newer));
        assert!(!first.exists());
        assert_eq!(generations(&store).len(), 1);

        let pointer_leftovers = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(pointer_leftovers, 0);
    }

    #[test]
    fn test_read_during_persist_sees_whole_generations() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        let older = artifact_set(&["V1", "Amount"], &[1.0, 1.0], 0.0);
        let newer = artifact_set(&["V1", "V2", "Amount"], &[2.0, 0.5, 0.1], -1.0);
        store.persist(&older).unwrap();

        let done = AtomicBool::new(false);
        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..200 {
                    let set = if i % 2 == 0 { &newer } else { &older };
                    store.persist(set).unwrap();
                }
                done.store(true, Ordering::Release);
            });

            let mut reads = 0;
            while !done.load(Ordering::Acquire) || reads == 0 {
                match store.read() {
                    Ok(Some(set)) => assert!(set == older || set == newer),
                    other => panic!("read during persist returned {other:?}"),
                }
                reads += 1;
            }
        });

        assert_eq!(generations(&store).len(), 1);
    }

    #[test]
    fn test_partial_presence_fails_loudly() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store
            .persist(&artifact_set(&["V1", "Amount"], &[1.0, 1.0], 0.0))
            .unwrap();
        let current = store.current_dir().unwrap().unwrap();
        fs::remove_file(current.join(METADATA_FILE)).unwrap();

        match store.load() {
            Err(ArtifactError::Incomplete { missing, .. }) => {
                assert_eq!(missing, vec![METADATA_FILE.to_string()]);
            }
            other => panic!("expected incomplete artifact error, got {other:?}"),
        }
    }

    #[test]
    fn test_pointer_to_missing_generation_fails_loudly() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store
            .persist(&artifact_set(&["V1", "Amount"], &[1.0, 1.0], 0.0))
            .unwrap();
        fs::remove_dir_all(store.current_dir().unwrap().unwrap()).unwrap();

        match store.read() {
            Err(ArtifactError::Incomplete { missing, .. }) => assert_eq!(missing.len(), 3),
            other => panic!("expected incomplete artifact error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_pointer_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(CURRENT_FILE), "../elsewhere").unwrap();

        assert!(matches!(store.read(), Err(ArtifactError::Inconsistent(_))));
    }

    #[test]
    fn test_cold_start_without_dataset_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        assert!(matches!(store.load(), Err(ArtifactError::DatasetMissing(_))));
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_empty_directory_counts_as_cold() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        fs::create_dir_all(store.dir()).unwrap();

        assert!(store.read().unwrap().is_none());
        assert!(store.current_dir().unwrap().is_none());
    }
}

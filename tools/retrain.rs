//! Retrain Tool
//!
//! Trains a fresh model from the configured dataset, prints the held-out
//! evaluation and atomically replaces the persisted artifact set.
//! A running scoring service keeps its old artifacts until restarted.

use anyhow::{Context, Result};
use fraud_scoring::{
    config::AppConfig,
    models::{ArtifactStore, Trainer},
};
use tracing::info;

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    config.logging.init_tracing()?;

    info!(
        dataset = %config.training.dataset_path.display(),
        artifacts_dir = %config.model.artifacts_dir.display(),
        "Starting retraining"
    );

    let store = ArtifactStore::new(
        config.model.artifacts_dir.clone(),
        Trainer::new(config.training.clone()),
    );
    let outcome = store
        .retrain_with_report()
        .context("Retraining failed; previous artifacts left in place")?;

    println!("{}", outcome.evaluation);
    info!(
        features = outcome.artifacts.schema().len(),
        trained_at = %outcome.artifacts.metadata.training_timestamp,
        roc_auc = outcome.evaluation.roc_auc,
        "Retraining complete"
    );

    Ok(())
}

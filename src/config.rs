//! Configuration management for the fraud scoring service

use crate::models::explain::{ContributionBasis, ContributionMode};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub validation: ValidationConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming feature mappings
    pub transaction_subject: String,
    /// Subject where scored records are published for persistence
    pub score_subject: String,
    /// Subject where rejected requests are published
    pub rejection_subject: String,
    /// Request/reply subject for model information
    pub model_info_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            transaction_subject: "transactions".to_string(),
            score_subject: "fraud.scores".to_string(),
            rejection_subject: "fraud.rejections".to_string(),
            model_info_subject: "fraud.model.info".to_string(),
        }
    }
}

/// Model artifacts and explanation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding classifier.json, scaler.json and metadata.json
    pub artifacts_dir: PathBuf,
    /// Number of contributing features reported per prediction
    pub top_k: usize,
    /// Report contributions as absolute magnitudes or signed values
    pub contribution_mode: ContributionMode,
    /// Values multiplied by the weights when computing contributions
    pub contribution_basis: ContributionBasis,
    /// Name of the monetary feature
    pub amount_feature: String,
    /// Number of globally important features reported by model info
    pub describe_top_n: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("models"),
            top_k: 5,
            contribution_mode: ContributionMode::Absolute,
            contribution_basis: ContributionBasis::Standardized,
            amount_feature: "Amount".to_string(),
            describe_top_n: 10,
        }
    }
}

/// Training job configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Labeled historical dataset (CSV)
    pub dataset_path: PathBuf,
    /// Binary label column (non-zero = fraud)
    pub label_column: String,
    /// Columns present in the dataset but not used as features
    pub drop_columns: Vec<String>,
    /// Fraction of each class held out for evaluation
    pub test_fraction: f64,
    /// Seed for the stratified split
    pub seed: u64,
    /// Maximum Newton iterations
    pub max_iter: usize,
    /// Convergence tolerance on the Newton step
    pub tolerance: f64,
    /// Inverse L2 regularization strength (C)
    pub regularization: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/creditcard.csv"),
            label_column: "Class".to_string(),
            drop_columns: vec!["Time".to_string()],
            test_fraction: 0.2,
            seed: 42,
            max_iter: 100,
            tolerance: 1e-8,
            regularization: 1.0,
        }
    }
}

/// Input validation bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Soft bound on |value| for every feature except the amount
    pub max_abs_value: f64,
    /// Amount must be strictly greater than this
    pub amount_min_exclusive: f64,
    /// Amount must be at most this
    pub amount_max: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_abs_value: 100.0,
            amount_min_exclusive: 0.0,
            amount_max: 25_000.0,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of messages scored concurrently
    pub workers: usize,
    /// Interval between metrics summaries
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            metrics_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` overrides `level`.
    pub fn init_tracing(&self) -> Result<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(format!("fraud_scoring={0},retrain={0}", self.level))
                .context("Invalid logging level")?,
        };

        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if self.format.eq_ignore_ascii_case("json") {
            builder.json().init();
        } else {
            builder.init();
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = std::env::var("FRAUD_CONFIG").unwrap_or_else(|_| "config/config.toml".into());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `FRAUD_` environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("FRAUD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

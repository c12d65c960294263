//! Fraud Scoring Library
//!
//! Scores transactions with a standardized linear classifier and explains
//! each score by ranking per-feature contributions. Artifacts are trained
//! from labeled history on first use and persisted as one unit.

pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod service;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use error::{ArtifactError, ScoringError};
pub use models::{ArtifactSet, ArtifactStore, Trainer};
pub use producer::ScoreProducer;
pub use service::ScoringService;
pub use types::{PredictionResult, RawFeatures};
pub use validation::{FeatureValidator, ValidationErrors};

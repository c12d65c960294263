//! Model artifacts, training, inference and explanation

pub mod artifacts;
pub mod dataset;
pub mod evaluation;
pub mod explain;
pub mod inference;
pub mod store;
pub mod trainer;

pub use artifacts::{ArtifactSet, LinearClassifier, ModelMetadata, StandardScaler};
pub use dataset::Dataset;
pub use evaluation::EvaluationReport;
pub use inference::{predict, Prediction};
pub use store::ArtifactStore;
pub use trainer::{Trainer, TrainingOutcome};

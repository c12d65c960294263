//! Type definitions shared by the scoring core and its transport

pub mod features;
pub mod prediction;

pub use features::{coerce_value, RawFeatures};
pub use prediction::{
    FeatureContribution, FeatureImportance, ModelDescription, ModelInfo, PredictionResult,
    Rejection, ScoredRecord,
};

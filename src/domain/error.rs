//! Domain error types.
//!
//! Configuration problems are detected before any data is
//! loaded and are always fatal. Metrics errors signal a broken
//! invariant in the epoch-end bookkeeping.

use thiserror::Error;

use crate::domain::dataset::DatasetId;

/// Invalid run configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid optimizer_name given: {0}")]
    UnknownOptimizer(String),

    #[error("Invalid scheduler_name given: {0}")]
    UnknownScheduler(String),

    #[error("Invalid model name given: {0} (expected `bert` or `t5`)")]
    UnknownModel(String),

    #[error("Unknown dataset identifier: {0}")]
    UnknownDataset(String),

    #[error("Either warmup_steps or warmup_ratio should be given, but not both.")]
    ConflictingWarmup,

    #[error("Either warmup_steps or warmup_ratio should be given, but none were given.")]
    MissingWarmup,

    #[error("Dataset {dataset} is not implemented for the {model} model")]
    UnsupportedDataset { model: &'static str, dataset: DatasetId },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Failure while parsing an optimizer string such as `sgd,lr=0.1`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerParseError {
    #[error("Malformed optimizer parameter `{0}` (expected key=value)")]
    MalformedPair(String),

    #[error("Optimizer parameter `{key}` has a non-numeric value `{value}`")]
    NonNumericValue { key: String, value: String },

    #[error("Unknown optimization method: \"{0}\"")]
    UnknownMethod(String),

    #[error("Unexpected parameters: expected {expected:?}, got {got:?}")]
    UnexpectedParameters { expected: Vec<String>, got: Vec<String> },

    #[error("Optimizer `{method}` requires parameter `{param}`")]
    MissingParameter { method: String, param: String },
}

/// Broken invariant while aggregating per-example results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Epoch results are empty")]
    Empty,

    #[error("Per-example field `{field}` has {actual} entries, expected {expected}")]
    LengthMismatch { field: &'static str, expected: usize, actual: usize },

    #[error("Accuracy mismatch: correctness flags give {from_flags}, predictions give {from_preds}")]
    AccuracyMismatch { from_flags: f64, from_preds: f64 },
}

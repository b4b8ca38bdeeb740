//! Errors raised while building run configurations.

use thiserror::Error;

/// A configuration that can never be built. Always fatal for the sweep.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported fixed-point word length {0} (expected 8, 16 or 32)")]
    UnsupportedWordLength(u32),
    #[error("unknown {axis} '{value}' (expected one of: {expected})")]
    UnknownAxisValue {
        axis: &'static str,
        value: String,
        expected: String,
    },
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),
    #[error("dataset name '{0}' must be a single directory name")]
    InvalidDatasetName(String),
}

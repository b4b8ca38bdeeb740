//! Sweep-wide failures. Anything here aborts the sweep before a single
//! point runs; per-point failures live in `RunOutcome` instead.

use edgesweep_core::ConfigError;
use edgesweep_toolchain::ToolchainError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error("{what} directory {} doesn't exist", .path.display())]
    MissingDirectory { what: &'static str, path: PathBuf },
    #[error("cannot resolve the working directory: {0}")]
    WorkingDirectory(#[source] io::Error),
    #[error("cannot prepare scratch directory {}: {source}", .path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

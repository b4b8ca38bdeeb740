//! Reading the stats file an executed predictor leaves behind.

use edgesweep_core::{Algorithm, DatasetType};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("stats file {} not found", .0.display())]
    NotFound(PathBuf),
    #[error("malformed stats file {}: first line '{line}' is not a number", .path.display())]
    Malformed { path: PathBuf, line: String },
    #[error("failed to read stats file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Stats files live under `<root>/output/<algorithm>-<version>/`.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn stats_path(&self, algorithm: Algorithm, version: &str, dataset_type: DatasetType) -> PathBuf {
        self.root
            .join("output")
            .join(format!("{algorithm}-{version}"))
            .join(format!("stats-{dataset_type}.txt"))
    }

    /// Remove a stats file left by an earlier point that shares this
    /// algorithm and version. A missing file is fine.
    pub fn clear(&self, algorithm: Algorithm, version: &str, dataset_type: DatasetType) -> Result<(), StatsError> {
        let path = self.stats_path(algorithm, version, dataset_type);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StatsError::Io { path, source }),
        }
    }

    /// The metric is the first line, trimmed, as an `f64`. Nothing is ever
    /// defaulted: a missing or unparsable file is an error.
    pub fn read_metric(
        &self,
        algorithm: Algorithm,
        version: &str,
        dataset_type: DatasetType,
    ) -> Result<f64, StatsError> {
        let path = self.stats_path(algorithm, version, dataset_type);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StatsError::NotFound(path));
            }
            Err(source) => return Err(StatsError::Io { path, source }),
        };

        let line = content.lines().next().unwrap_or("").trim();
        match line.parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => Err(StatsError::Malformed {
                line: line.to_string(),
                path,
            }),
        }
    }
}

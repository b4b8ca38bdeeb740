//! Scratch/output directories for a sweep and the per-point input paths.

use crate::error::SweepError;
use crate::settings::SweepSettings;
use edgesweep_core::{ModelSource, RunConfiguration, Target};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directories owned by one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchLayout {
    pub temp_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl ScratchLayout {
    /// User-supplied directories must exist and are used as-is. The default
    /// temp dir is wiped and recreated so every sweep starts clean.
    pub fn prepare(settings: &SweepSettings, targets: &[Target]) -> Result<Self, SweepError> {
        let temp_dir = match &settings.temp_dir {
            Some(dir) => require_dir("scratch", dir)?,
            None => {
                let dir = settings.work_dir.join("temp");
                if dir.exists() {
                    fs::remove_dir_all(&dir).map_err(|source| scratch(&dir, source))?;
                }
                fs::create_dir_all(&dir).map_err(|source| scratch(&dir, source))?;
                dir
            }
        };

        let out_dir = match &settings.out_dir {
            Some(dir) => require_dir("output", dir)?,
            None => {
                let dir = default_out_dir(&settings.work_dir, &temp_dir, targets);
                fs::create_dir_all(&dir).map_err(|source| scratch(&dir, source))?;
                dir
            }
        };

        info!(temp = %temp_dir.display(), out = %out_dir.display(), "prepared scratch layout");
        Ok(Self { temp_dir, out_dir })
    }

    /// Per-point output directory, distinct for every configuration.
    pub fn point_dir(&self, config: &RunConfiguration) -> PathBuf {
        self.out_dir.join(config.slug())
    }
}

/// Embedded targets get their own dump tree, but only when they are the sole
/// target of the sweep.
fn default_out_dir(work_dir: &Path, temp_dir: &Path, targets: &[Target]) -> PathBuf {
    match targets {
        [Target::Arduino] => work_dir.join("arduinodump").join("arduino"),
        [Target::M3] => work_dir.join("m3dump"),
        _ => temp_dir.join("arduino"),
    }
}

pub(crate) fn require_dir(what: &'static str, dir: &Path) -> Result<PathBuf, SweepError> {
    if dir.is_dir() {
        Ok(dir.to_path_buf())
    } else {
        Err(SweepError::MissingDirectory {
            what,
            path: dir.to_path_buf(),
        })
    }
}

fn scratch(path: &Path, source: std::io::Error) -> SweepError {
    SweepError::Scratch {
        path: path.to_path_buf(),
        source,
    }
}

/// Everything the code generator and runner need to know about one point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointInputs {
    pub config: RunConfiguration,
    pub source: ModelSource,
    pub dataset_dir: PathBuf,
    pub model_dir: PathBuf,
    pub training_input: PathBuf,
    pub testing_input: PathBuf,
    pub output_dir: PathBuf,
}

impl PointInputs {
    pub fn derive(settings: &SweepSettings, layout: &ScratchLayout, config: &RunConfiguration) -> Self {
        let algorithm = config.algorithm().as_str();
        let dataset = config.dataset().as_str();
        let dataset_dir = settings.datasets_root.join(algorithm).join(dataset);
        let model_dir = settings.models_root.join(algorithm).join(dataset);
        let suffix = settings.source.input_suffix();

        Self {
            config: config.clone(),
            source: settings.source,
            training_input: dataset_dir.join(format!("train{suffix}.npy")),
            testing_input: dataset_dir.join(format!("test{suffix}.npy")),
            dataset_dir,
            model_dir,
            output_dir: layout.point_dir(config),
        }
    }

    /// Name the first missing input directory, if any.
    pub fn check(&self) -> Result<(), String> {
        for (what, dir) in [("dataset", &self.dataset_dir), ("model", &self.model_dir)] {
            if !dir.is_dir() {
                return Err(format!("{what} directory {} doesn't exist", dir.display()));
            }
        }
        Ok(())
    }
}

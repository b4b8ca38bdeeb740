//! Immutable sweep settings, loaded from JSON and overridden from the CLI.

use anyhow::{Context, Result};
use edgesweep_core::{DatasetType, ModelSource, BASE_WORD_LENGTH};
use edgesweep_runner::RunnerOptions;
use edgesweep_toolchain::ToolchainSearch;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// External code generator invoked once per point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerCommand {
    pub program: PathBuf,
    /// Arguments placed before the per-point positional arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Root that relative scratch paths (`temp`, `arduinodump`, `m3dump`)
    /// hang off.
    pub work_dir: PathBuf,
    /// Generated predictor project; builds and executions run here.
    pub project_dir: PathBuf,
    pub datasets_root: PathBuf,
    pub models_root: PathBuf,
    /// User scratch directory. Must already exist; never wiped.
    pub temp_dir: Option<PathBuf>,
    /// User output directory. Must already exist.
    pub out_dir: Option<PathBuf>,
    pub dataset_type: DatasetType,
    pub source: ModelSource,
    pub word_length: u32,
    pub num_outputs: u32,
    pub max_scale_factor: Option<i32>,
    pub load_scale_factor: bool,
    pub use_alternate_toolchain: bool,
    #[serde(flatten)]
    pub toolchain: ToolchainSearch,
    /// `None` waits for the build forever.
    pub build_timeout_secs: Option<u64>,
    pub execute_timeout_secs: Option<u64>,
    pub producer: Option<ProducerCommand>,
    pub allow_unknown_datasets: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            project_dir: PathBuf::from("."),
            datasets_root: PathBuf::from("datasets"),
            models_root: PathBuf::from("model"),
            temp_dir: None,
            out_dir: None,
            dataset_type: DatasetType::default(),
            source: ModelSource::default(),
            word_length: BASE_WORD_LENGTH,
            num_outputs: 1,
            max_scale_factor: None,
            load_scale_factor: false,
            use_alternate_toolchain: false,
            toolchain: ToolchainSearch::default(),
            build_timeout_secs: Some(600),
            execute_timeout_secs: Some(600),
            producer: None,
            allow_unknown_datasets: false,
        }
    }
}

impl SweepSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let blob = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings = serde_json::from_str(&blob)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_secs.map(Duration::from_secs)
    }

    pub fn execute_timeout(&self) -> Option<Duration> {
        self.execute_timeout_secs.map(Duration::from_secs)
    }

    /// Copy with the dataset and model roots resolved against the current
    /// directory, so a generator running in the project directory sees the
    /// same inputs the sweep checked.
    pub fn with_absolute_input_roots(&self) -> io::Result<Self> {
        let cwd = env::current_dir()?;
        Ok(Self {
            datasets_root: cwd.join(&self.datasets_root),
            models_root: cwd.join(&self.models_root),
            ..self.clone()
        })
    }

    pub fn runner_options(&self, project_dir: PathBuf) -> RunnerOptions {
        RunnerOptions {
            project_dir,
            dataset_type: self.dataset_type,
            build_timeout: self.build_timeout(),
            execute_timeout: self.execute_timeout(),
        }
    }
}

//! Upstream code generation seam. The sweep only needs buildable source to
//! be sitting in the project directory before a point is built.

use crate::layout::PointInputs;
use crate::settings::{ProducerCommand, SweepSettings};
use anyhow::{bail, Context, Result};
use edgesweep_toolchain::run_logged;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::info;

pub const CODEGEN_LOG: &str = "codegen.txt";

/// Deposits buildable source for one point into the project directory.
pub trait SourceProducer: Send + Sync {
    fn name(&self) -> &str;

    fn produce(&self, point: &PointInputs, project_dir: &Path) -> Result<()>;
}

/// Source is generated out of band; nothing to do.
pub struct PreDeposited;

impl SourceProducer for PreDeposited {
    fn name(&self) -> &str {
        "pre-deposited"
    }

    fn produce(&self, _point: &PointInputs, _project_dir: &Path) -> Result<()> {
        Ok(())
    }
}

/// Runs an external generator with the point's axes as positional arguments.
pub struct CommandProducer {
    command: ProducerCommand,
    timeout: Option<Duration>,
    env: Vec<(&'static str, String)>,
}

impl CommandProducer {
    pub fn new(command: ProducerCommand, settings: &SweepSettings) -> Self {
        let mut env = vec![
            ("EDGESWEEP_NUM_OUTPUTS", settings.num_outputs.to_string()),
            (
                "EDGESWEEP_LOAD_SCALE_FACTOR",
                settings.load_scale_factor.to_string(),
            ),
        ];
        if let Some(scale) = settings.max_scale_factor {
            env.push(("EDGESWEEP_MAX_SCALE_FACTOR", scale.to_string()));
        }

        Self {
            command,
            timeout: settings.build_timeout(),
            env,
        }
    }

    fn command_for(&self, point: &PointInputs, project_dir: &Path) -> Command {
        let config = &point.config;
        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .arg(config.algorithm().as_str())
            .arg(config.encoding().as_str())
            .arg(config.dataset().as_str())
            .arg(config.target().as_str())
            .arg(&point.model_dir)
            .arg(&point.training_input)
            .arg(&point.testing_input)
            .arg(config.metric().as_str())
            .arg(point.source.as_str())
            .current_dir(project_dir);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

impl SourceProducer for CommandProducer {
    fn name(&self) -> &str {
        "command"
    }

    fn produce(&self, point: &PointInputs, project_dir: &Path) -> Result<()> {
        fs::create_dir_all(&point.output_dir)
            .with_context(|| format!("creating {}", point.output_dir.display()))?;
        let log = point.output_dir.join(CODEGEN_LOG);
        info!(
            program = %self.command.program.display(),
            config = %point.config,
            "generating predictor source"
        );

        let outcome = run_logged(self.command_for(point, project_dir), &log, "codegen", self.timeout)
            .with_context(|| format!("launching {}", self.command.program.display()))?;
        if !outcome.success() {
            bail!("code generation {outcome} (see {})", log.display());
        }
        Ok(())
    }
}

pub fn producer_from_settings(settings: &SweepSettings) -> Box<dyn SourceProducer> {
    match &settings.producer {
        Some(command) => Box::new(CommandProducer::new(command.clone(), settings)),
        None => Box::new(PreDeposited),
    }
}

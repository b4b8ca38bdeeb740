//! Build → execute → parse for a single configuration.

use crate::report::{RunOutcome, RunReport, RunStage};
use crate::results::ResultStore;
use edgesweep_core::{DatasetType, RunConfiguration};
use edgesweep_toolchain::{run_logged, DynBuildStrategy, ProcessOutcome};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const EXEC_LOG: &str = "exec.txt";

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Directory holding the generated project; build and execution run here.
    pub project_dir: PathBuf,
    pub dataset_type: DatasetType,
    pub build_timeout: Option<Duration>,
    pub execute_timeout: Option<Duration>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            dataset_type: DatasetType::default(),
            build_timeout: Some(Duration::from_secs(600)),
            execute_timeout: Some(Duration::from_secs(600)),
        }
    }
}

pub struct BuildExecuteRunner {
    strategy: DynBuildStrategy,
    store: ResultStore,
    options: RunnerOptions,
}

impl BuildExecuteRunner {
    pub fn new(strategy: DynBuildStrategy, options: RunnerOptions) -> Self {
        let store = ResultStore::new(options.project_dir.clone());
        Self {
            strategy,
            store,
            options,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run one configuration to a terminal state. Never retries and never
    /// errors: every failure ends up in the returned report.
    pub fn run(&self, config: &RunConfiguration, output_dir: &Path) -> RunReport {
        let mut report = RunReport::begin(config.clone());
        let mut stage = RunStage::Idle;

        advance(&mut stage, RunStage::Building, config);
        if let Err(err) = fs::create_dir_all(output_dir) {
            advance(&mut stage, RunStage::BuildFailed, config);
            report.outcome = RunOutcome::BuildFailed {
                reason: format!("cannot create {}: {err}", output_dir.display()),
            };
            return report;
        }

        let build_log = output_dir.join(self.strategy.build_log_name());
        report.logs.build = Some(build_log.clone());
        let build = run_logged(
            self.strategy.build_command(&self.options.project_dir),
            &build_log,
            "build",
            self.options.build_timeout,
        );
        if let Err(reason) = check("build", build) {
            advance(&mut stage, RunStage::BuildFailed, config);
            warn!(config = %config, %reason, "build failed");
            report.outcome = RunOutcome::BuildFailed { reason };
            return report;
        }
        report.build_succeeded = true;
        advance(&mut stage, RunStage::Built, config);

        let version = config.version();
        let dataset_type = self.options.dataset_type;
        if let Err(err) = self.store.clear(config.algorithm(), &version, dataset_type) {
            advance(&mut stage, RunStage::ExecFailed, config);
            warn!(config = %config, error = %err, "could not clear stale stats");
            report.outcome = RunOutcome::ExecFailed {
                reason: err.to_string(),
            };
            return report;
        }

        advance(&mut stage, RunStage::Executing, config);
        let exec_log = output_dir.join(EXEC_LOG);
        report.logs.exec = Some(exec_log.clone());
        let args = [config.algorithm().as_str(), version.as_str(), dataset_type.as_str()];
        let execution = run_logged(
            self.strategy.execute_command(&self.options.project_dir, &args),
            &exec_log,
            "execute",
            self.options.execute_timeout,
        );
        if let Err(reason) = check("execution", execution) {
            advance(&mut stage, RunStage::ExecFailed, config);
            warn!(config = %config, %reason, "execution failed");
            report.outcome = RunOutcome::ExecFailed { reason };
            return report;
        }
        report.execute_succeeded = true;
        advance(&mut stage, RunStage::Executed, config);

        advance(&mut stage, RunStage::ParsingResult, config);
        match self.store.read_metric(config.algorithm(), &version, dataset_type) {
            Ok(value) => {
                advance(&mut stage, RunStage::Done, config);
                info!(config = %config, metric = value, "run completed");
                report.metric_value = Some(value);
                report.outcome = RunOutcome::Done;
            }
            Err(err) => {
                advance(&mut stage, RunStage::ParseFailed, config);
                warn!(config = %config, error = %err, "could not read stats");
                report.outcome = RunOutcome::ParseFailed {
                    reason: err.to_string(),
                };
            }
        }

        debug_assert!(stage.is_terminal());
        report
    }
}

fn advance(stage: &mut RunStage, next: RunStage, config: &RunConfiguration) {
    debug!(config = %config, from = %stage, to = %next, "runner transition");
    *stage = next;
}

fn check(what: &str, outcome: std::io::Result<ProcessOutcome>) -> Result<(), String> {
    match outcome {
        Ok(outcome) if outcome.success() => Ok(()),
        Ok(outcome) => Err(format!("{what} {outcome}")),
        Err(err) => Err(format!("failed to launch {what}: {err}")),
    }
}

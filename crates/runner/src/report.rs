//! Per-point run reports.

use edgesweep_core::RunConfiguration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Runner state machine. Terminal states are `BuildFailed`, `ExecFailed`,
/// `ParseFailed` and `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    Idle,
    Building,
    BuildFailed,
    Built,
    Executing,
    ExecFailed,
    Executed,
    ParsingResult,
    ParseFailed,
    Done,
}

impl RunStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStage::BuildFailed | RunStage::ExecFailed | RunStage::ParseFailed | RunStage::Done
        )
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How processing of one point ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum RunOutcome {
    Done,
    /// The point never reached the runner (missing inputs, producer failure).
    Skipped { reason: String },
    BuildFailed { reason: String },
    ExecFailed { reason: String },
    ParseFailed { reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Done)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RunOutcome::Done => None,
            RunOutcome::Skipped { reason }
            | RunOutcome::BuildFailed { reason }
            | RunOutcome::ExecFailed { reason }
            | RunOutcome::ParseFailed { reason } => Some(reason),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Done => "done",
            RunOutcome::Skipped { .. } => "skipped",
            RunOutcome::BuildFailed { .. } => "build failed",
            RunOutcome::ExecFailed { .. } => "execution failed",
            RunOutcome::ParseFailed { .. } => "parse failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub configuration: RunConfiguration,
    pub build_succeeded: bool,
    pub execute_succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<f64>,
    pub logs: RunLogs,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub(crate) fn begin(configuration: RunConfiguration) -> Self {
        Self {
            configuration,
            build_succeeded: false,
            execute_succeeded: false,
            metric_value: None,
            logs: RunLogs::default(),
            outcome: RunOutcome::Skipped {
                reason: "not started".into(),
            },
        }
    }

    /// Report for a point aborted before the runner was invoked.
    pub fn skipped(configuration: RunConfiguration, reason: impl Into<String>) -> Self {
        Self {
            outcome: RunOutcome::Skipped {
                reason: reason.into(),
            },
            ..Self::begin(configuration)
        }
    }
}

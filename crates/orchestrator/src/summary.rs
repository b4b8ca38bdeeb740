//! End-of-sweep summary: printable table, JSON persistence and diffing
//! against a previous sweep.

use anyhow::Result;
use edgesweep_core::DatasetType;
use edgesweep_runner::RunReport;
use edgesweep_toolchain::{HostPlatform, ToolchainDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSummary {
    pub slug: String,
    pub algorithm: String,
    pub encoding: String,
    pub dataset: String,
    pub target: String,
    pub metric: String,
    pub version: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PointSummary {
    pub fn from_report(report: &RunReport) -> Self {
        let config = &report.configuration;
        Self {
            slug: config.slug(),
            algorithm: config.algorithm().to_string(),
            encoding: config.encoding().to_string(),
            dataset: config.dataset().to_string(),
            target: config.target().to_string(),
            metric: config.metric().to_string(),
            version: config.version(),
            status: report.outcome.label().to_string(),
            metric_value: report.metric_value,
            reason: report.outcome.reason().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub host: HostPlatform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainDescriptor>,
    pub dataset_type: DatasetType,
    pub generated_at_unix_ms: u128,
    pub points: Vec<PointSummary>,
}

#[derive(Debug)]
pub struct MetricDelta<'a> {
    pub current: &'a PointSummary,
    pub baseline: &'a PointSummary,
    pub metric_delta: f64,
}

impl SweepSummary {
    pub fn new(
        host: HostPlatform,
        toolchain: Option<ToolchainDescriptor>,
        dataset_type: DatasetType,
        reports: &[RunReport],
    ) -> Self {
        let generated_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis();

        Self {
            host,
            toolchain,
            dataset_type,
            generated_at_unix_ms,
            points: reports.iter().map(PointSummary::from_report).collect(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.points
            .iter()
            .filter(|point| point.metric_value.is_some())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.points.len() - self.succeeded()
    }

    pub fn as_map(&self) -> BTreeMap<&str, &PointSummary> {
        self.points
            .iter()
            .map(|point| (point.slug.as_str(), point))
            .collect()
    }

    /// Metric deltas for points that produced a value in both sweeps.
    pub fn diff<'a>(&'a self, baseline: &'a SweepSummary) -> BTreeMap<&'a str, MetricDelta<'a>> {
        let previous = baseline.as_map();
        self.as_map()
            .into_iter()
            .filter_map(|(slug, current)| {
                let baseline = *previous.get(slug)?;
                let delta = current.metric_value? - baseline.metric_value?;
                Some((
                    slug,
                    MetricDelta {
                        current,
                        baseline,
                        metric_delta: delta,
                    },
                ))
            })
            .collect()
    }

    pub fn render_table(&self) -> String {
        let width = self
            .points
            .iter()
            .map(|point| point.slug.len())
            .max()
            .unwrap_or(0)
            .max("configuration".len());

        let mut out = String::new();
        let _ = writeln!(out, "{:<width$}  {:>10}  status", "configuration", "accuracy");
        for point in &self.points {
            let value = point
                .metric_value
                .map(|value| format!("{value:.4}"))
                .unwrap_or_else(|| "-".to_string());
            let _ = match &point.reason {
                Some(reason) => writeln!(
                    out,
                    "{:<width$}  {:>10}  {} ({})",
                    point.slug, value, point.status, reason
                ),
                None => writeln!(out, "{:<width$}  {:>10}  {}", point.slug, value, point.status),
            };
        }
        let _ = write!(
            out,
            "{} of {} configurations succeeded",
            self.succeeded(),
            self.points.len()
        );
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let summary = serde_json::from_str(&json)?;
        Ok(summary)
    }
}

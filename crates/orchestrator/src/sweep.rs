//! Cartesian sweep over the configuration axes.

use crate::error::SweepError;
use crate::layout::{require_dir, PointInputs, ScratchLayout};
use crate::producer::{producer_from_settings, SourceProducer};
use crate::settings::SweepSettings;
use edgesweep_core::{Algorithm, Dataset, Encoding, Metric, RunConfiguration, Target};
use edgesweep_runner::{BuildExecuteRunner, RunReport};
use edgesweep_toolchain::{strategy_for, ToolchainDescriptor, ToolchainResolver};
use std::cell::OnceCell;
use std::fs;
use tracing::{info, warn};

/// One or many values for a single axis. Singletons normalise to a
/// one-element sequence so enumeration never special-cases them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<T>(Vec<T>);

impl<T> Selection<T> {
    pub fn into_values(self) -> Vec<T> {
        self.0
    }
}

impl<T> From<T> for Selection<T> {
    fn from(value: T) -> Self {
        Self(vec![value])
    }
}

impl<T> From<Vec<T>> for Selection<T> {
    fn from(values: Vec<T>) -> Self {
        Self(values)
    }
}

impl<T: Clone> From<&[T]> for Selection<T> {
    fn from(values: &[T]) -> Self {
        Self(values.to_vec())
    }
}

impl<T: Default> Default for Selection<T> {
    fn default() -> Self {
        Self(vec![T::default()])
    }
}

/// Values chosen for every axis. Axes left empty fall back to the axis
/// default when the sweep is planned.
#[derive(Debug, Clone, Default)]
pub struct AxisSelections {
    pub algorithms: Vec<Algorithm>,
    pub encodings: Vec<Encoding>,
    pub datasets: Vec<Dataset>,
    pub targets: Vec<Target>,
    pub metrics: Vec<Metric>,
}

impl AxisSelections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn algorithms(mut self, selection: impl Into<Selection<Algorithm>>) -> Self {
        self.algorithms = selection.into().into_values();
        self
    }

    pub fn encodings(mut self, selection: impl Into<Selection<Encoding>>) -> Self {
        self.encodings = selection.into().into_values();
        self
    }

    pub fn datasets(mut self, selection: impl Into<Selection<Dataset>>) -> Self {
        self.datasets = selection.into().into_values();
        self
    }

    pub fn targets(mut self, selection: impl Into<Selection<Target>>) -> Self {
        self.targets = selection.into().into_values();
        self
    }

    pub fn metrics(mut self, selection: impl Into<Selection<Metric>>) -> Self {
        self.metrics = selection.into().into_values();
        self
    }

    /// Copy with every empty axis replaced by its default value.
    pub fn normalized(&self) -> Self {
        Self {
            algorithms: or_default(&self.algorithms),
            encodings: or_default(&self.encodings),
            datasets: or_default(&self.datasets),
            targets: or_default(&self.targets),
            metrics: or_default(&self.metrics),
        }
    }

    pub fn point_count(&self) -> usize {
        let axes = self.normalized();
        axes.algorithms.len()
            * axes.encodings.len()
            * axes.datasets.len()
            * axes.targets.len()
            * axes.metrics.len()
    }
}

fn or_default<T: Clone + Default>(values: &[T]) -> Vec<T> {
    if values.is_empty() {
        Selection::<T>::default().into_values()
    } else {
        values.to_vec()
    }
}

/// Progress notifications emitted while a sweep runs.
#[derive(Debug)]
pub enum SweepEvent<'a> {
    PointStarted {
        index: usize,
        total: usize,
        config: &'a RunConfiguration,
    },
    PointFinished {
        index: usize,
        total: usize,
        report: &'a RunReport,
    },
}

pub struct SweepOrchestrator {
    settings: SweepSettings,
    resolver: ToolchainResolver,
    producer: Box<dyn SourceProducer>,
    toolchain: OnceCell<ToolchainDescriptor>,
}

impl SweepOrchestrator {
    pub fn new(settings: SweepSettings) -> Self {
        let resolver = ToolchainResolver::for_current_host(
            settings.use_alternate_toolchain,
            settings.toolchain.clone(),
        );
        let producer = producer_from_settings(&settings);
        Self {
            settings,
            resolver,
            producer,
            toolchain: OnceCell::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: ToolchainResolver) -> Self {
        self.resolver = resolver;
        self.toolchain = OnceCell::new();
        self
    }

    pub fn with_producer<P>(mut self, producer: P) -> Self
    where
        P: SourceProducer + 'static,
    {
        self.producer = Box::new(producer);
        self
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &ToolchainResolver {
        &self.resolver
    }

    /// Resolve the build tool, at most once per orchestrator.
    pub fn toolchain(&self) -> Result<&ToolchainDescriptor, SweepError> {
        if let Some(descriptor) = self.toolchain.get() {
            return Ok(descriptor);
        }
        let descriptor = self.resolver.resolve()?;
        Ok(self.toolchain.get_or_init(|| descriptor))
    }

    /// Every point in enumeration order (algorithm, encoding, dataset,
    /// target, metric). Fails if any point cannot be configured.
    pub fn plan(&self, selections: &AxisSelections) -> Result<Vec<RunConfiguration>, SweepError> {
        let axes = selections.normalized();
        let mut points = Vec::with_capacity(selections.point_count());
        for &algorithm in &axes.algorithms {
            for &encoding in &axes.encodings {
                for dataset in &axes.datasets {
                    for &target in &axes.targets {
                        for &metric in &axes.metrics {
                            points.push(RunConfiguration::new(
                                algorithm,
                                encoding,
                                dataset.clone(),
                                target,
                                metric,
                                self.settings.word_length,
                            )?);
                        }
                    }
                }
            }
        }
        Ok(points)
    }

    pub fn run_sweep(&self, selections: &AxisSelections) -> Result<Vec<RunReport>, SweepError> {
        self.run_sweep_with(selections, |_| {})
    }

    /// Run every point sequentially. Only sweep-wide setup failures are
    /// returned as errors; point failures are recorded in the reports.
    pub fn run_sweep_with<F>(
        &self,
        selections: &AxisSelections,
        mut on_event: F,
    ) -> Result<Vec<RunReport>, SweepError>
    where
        F: FnMut(SweepEvent<'_>),
    {
        let points = self.plan(selections)?;
        let settings = self
            .settings
            .with_absolute_input_roots()
            .map_err(SweepError::WorkingDirectory)?;
        let layout = ScratchLayout::prepare(&self.settings, &selections.normalized().targets)?;
        let descriptor = self.toolchain()?;
        let project_dir = require_dir("project", &self.settings.project_dir)?;
        let project_dir = fs::canonicalize(&project_dir).map_err(|source| SweepError::Scratch {
            path: project_dir.clone(),
            source,
        })?;

        let runner = BuildExecuteRunner::new(
            strategy_for(descriptor),
            self.settings.runner_options(project_dir),
        );

        let total = points.len();
        info!(points = total, toolchain = %descriptor.kind, producer = self.producer.name(), "starting sweep");

        let mut reports = Vec::with_capacity(total);
        for (index, config) in points.iter().enumerate() {
            on_event(SweepEvent::PointStarted {
                index,
                total,
                config,
            });
            let report = self.run_point(&settings, &runner, &layout, config);
            on_event(SweepEvent::PointFinished {
                index,
                total,
                report: &report,
            });
            reports.push(report);
        }

        Ok(reports)
    }

    fn run_point(
        &self,
        settings: &SweepSettings,
        runner: &BuildExecuteRunner,
        layout: &ScratchLayout,
        config: &RunConfiguration,
    ) -> RunReport {
        let inputs = PointInputs::derive(settings, layout, config);
        if let Err(reason) = inputs.check() {
            warn!(config = %config, %reason, "skipping point");
            return RunReport::skipped(config.clone(), reason);
        }

        if let Err(err) = self.producer.produce(&inputs, &runner.options().project_dir) {
            warn!(config = %config, error = %err, "code generation failed");
            return RunReport::skipped(config.clone(), format!("code generation failed: {err:#}"));
        }

        runner.run(config, &inputs.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgesweep_toolchain::{HostPlatform, ToolchainSearch};
    use std::path::Path;

    fn settings_in(dir: &Path) -> SweepSettings {
        SweepSettings {
            work_dir: dir.to_path_buf(),
            project_dir: dir.to_path_buf(),
            datasets_root: dir.join("datasets"),
            models_root: dir.join("model"),
            ..SweepSettings::default()
        }
    }

    fn unix_orchestrator(dir: &Path) -> SweepOrchestrator {
        SweepOrchestrator::new(settings_in(dir)).with_resolver(ToolchainResolver::new(
            HostPlatform::Unix,
            false,
            ToolchainSearch::default(),
        ))
    }

    #[test]
    fn singleton_and_vector_selections_normalise() {
        let single: Selection<Algorithm> = Algorithm::Bonsai.into();
        assert_eq!(single.into_values(), [Algorithm::Bonsai]);
        let many: Selection<Encoding> = vec![Encoding::Fixed, Encoding::Float].into();
        assert_eq!(many.into_values().len(), 2);
    }

    #[test]
    fn empty_axes_fall_back_to_defaults() {
        let axes = AxisSelections::new().normalized();
        assert_eq!(axes.algorithms, [Algorithm::Protonn]);
        assert_eq!(axes.encodings, [Encoding::Fixed]);
        assert_eq!(axes.datasets, [Dataset::default()]);
        assert_eq!(axes.targets, [Target::X86]);
        assert_eq!(axes.metrics, [Metric::Acc]);
        assert_eq!(AxisSelections::new().point_count(), 1);
    }

    #[test]
    fn plan_enumerates_in_axis_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let orchestrator = unix_orchestrator(dir.path());
        let selections = AxisSelections::new()
            .algorithms(vec![Algorithm::Bonsai, Algorithm::Protonn])
            .encodings(vec![Encoding::Fixed, Encoding::Float])
            .metrics(vec![Metric::Acc, Metric::Disagree]);

        let plan = orchestrator.plan(&selections)?;
        assert_eq!(plan.len(), 8);
        assert_eq!(plan.len(), selections.point_count());
        let slugs: Vec<String> = plan.iter().map(RunConfiguration::slug).collect();
        assert_eq!(slugs[0], "bonsai-fixed-cifar-binary-x86-acc");
        assert_eq!(slugs[1], "bonsai-fixed-cifar-binary-x86-disagree");
        assert_eq!(slugs[2], "bonsai-float-cifar-binary-x86-acc");
        assert_eq!(slugs[4], "protonn-fixed-cifar-binary-x86-acc");
        Ok(())
    }

    #[test]
    fn unsupported_word_length_is_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut settings = settings_in(dir.path());
        settings.word_length = 12;
        let orchestrator = SweepOrchestrator::new(settings);

        let err = orchestrator
            .run_sweep(&AxisSelections::new().encodings(Encoding::Fixed))
            .unwrap_err();
        assert!(matches!(err, SweepError::Config(_)));
        assert!(!dir.path().join("temp").exists());

        let plan = orchestrator.plan(&AxisSelections::new().encodings(Encoding::Float))?;
        assert_eq!(plan.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_inputs_skip_points_but_not_the_sweep() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let orchestrator = unix_orchestrator(dir.path());
        let selections = AxisSelections::new().targets(vec![Target::X86, Target::Arduino]);

        let mut started = 0;
        let reports = orchestrator.run_sweep_with(&selections, |event| {
            if let SweepEvent::PointStarted { .. } = event {
                started += 1;
            }
        })?;
        assert_eq!(started, 2);
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(!report.build_succeeded);
            assert!(report.logs.build.is_none());
            assert!(report.outcome.reason().unwrap().contains("dataset directory"));
        }
        assert_eq!(reports[1].configuration.target(), Target::Arduino);
        Ok(())
    }

    #[test]
    fn toolchain_is_resolved_once() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let orchestrator = unix_orchestrator(dir.path());
        let first = orchestrator.toolchain()? as *const ToolchainDescriptor;
        let second = orchestrator.toolchain()? as *const ToolchainDescriptor;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn missing_project_dir_is_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut settings = settings_in(dir.path());
        settings.project_dir = dir.path().join("predictor");
        let orchestrator = SweepOrchestrator::new(settings).with_resolver(ToolchainResolver::new(
            HostPlatform::Unix,
            false,
            ToolchainSearch::default(),
        ));

        let err = orchestrator.run_sweep(&AxisSelections::new()).unwrap_err();
        assert!(matches!(err, SweepError::MissingDirectory { what: "project", .. }));
        Ok(())
    }
}

//! CLI wiring for the edgesweep driver.

use crate::settings::SweepSettings;
use crate::summary::SweepSummary;
use crate::sweep::{AxisSelections, SweepEvent, SweepOrchestrator};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgesweep_core::{
    Algorithm, Dataset, DatasetType, Encoding, Metric, ModelSource, Target, COMMON_DATASETS,
    EXTRA_DATASETS,
};
use edgesweep_toolchain::{interrupt_live_groups, ToolchainResolver};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "edgesweep", version, about = "Build, run and score generated predictors across a configuration sweep")]
pub struct Cli {
    /// Log level used when RUST_LOG is unset: error, warn, info, debug, trace.
    #[arg(short, long, global = true, default_value = "error")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sweep the cross product of the selected axes.
    Run(RunArgs),
    /// Print the toolchain the sweep would use.
    Toolchain(ToolchainArgs),
    /// List the known datasets.
    Datasets,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Algorithms to run.
    #[arg(short, long, value_delimiter = ',')]
    pub algo: Vec<Algorithm>,
    /// Floating-point or fixed-point code.
    #[arg(short, long, value_delimiter = ',')]
    pub encoding: Vec<Encoding>,
    /// Datasets to use.
    #[arg(short, long, value_delimiter = ',')]
    pub dataset: Vec<String>,
    /// Target devices.
    #[arg(short, long, value_delimiter = ',')]
    pub target: Vec<Target>,
    /// Metric maximised during exploration.
    #[arg(short, long, value_delimiter = ',')]
    pub metric: Vec<Metric>,
    /// Dataset split the predictor evaluates.
    #[arg(long)]
    pub dataset_type: Option<DatasetType>,
    /// Model source format.
    #[arg(short, long)]
    pub source: Option<ModelSource>,
    /// JSON settings file; flags override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Existing scratch directory (default: fresh `temp/`).
    #[arg(long)]
    pub tempdir: Option<PathBuf>,
    /// Existing output directory (default depends on the target).
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,
    /// Directory holding the generated predictor project.
    #[arg(long)]
    pub project_dir: Option<PathBuf>,
    #[arg(long)]
    pub datasets_root: Option<PathBuf>,
    #[arg(long)]
    pub models_root: Option<PathBuf>,
    /// Build with the MinGW toolchain instead of MSBuild on Windows.
    #[arg(long)]
    pub alternate_toolchain: bool,
    /// Directory prepended to PATH for the MinGW build.
    #[arg(long)]
    pub compiler_root: Option<PathBuf>,
    /// Build timeout in seconds (0 waits forever).
    #[arg(long)]
    pub build_timeout: Option<u64>,
    /// Execution timeout in seconds (0 waits forever).
    #[arg(long)]
    pub exec_timeout: Option<u64>,
    #[arg(short, long)]
    pub num_outputs: Option<u32>,
    /// Use the legacy max-scale mechanism with this scale factor.
    #[arg(long, allow_negative_numbers = true)]
    pub max_scale_factor: Option<i32>,
    /// Use a user-provided max scale.
    #[arg(long = "load-sf")]
    pub load_sf: bool,
    /// Accept dataset names outside the known suites.
    #[arg(long)]
    pub allow_unknown_datasets: bool,
    /// Write the sweep summary as JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Compare against a previous JSON summary.
    #[arg(long)]
    pub baseline: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ToolchainArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub alternate_toolchain: bool,
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log));
    tracing_subscriber::fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Run(args) => {
            install_interrupt_handler()?;
            run_sweep(args)
        }
        Command::Toolchain(args) => {
            let mut settings = load_settings(args.config.as_ref())?;
            settings.use_alternate_toolchain |= args.alternate_toolchain;
            let resolver = ToolchainResolver::for_current_host(
                settings.use_alternate_toolchain,
                settings.toolchain.clone(),
            );
            let descriptor = resolver.resolve()?;
            println!("host={}", resolver.host());
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
            Ok(())
        }
        Command::Datasets => {
            println!("common: {}", COMMON_DATASETS.join(", "));
            println!("extra: {}", EXTRA_DATASETS.join(", "));
            Ok(())
        }
    }
}

/// Children run in their own process groups, so a terminal interrupt no
/// longer reaches them. Kill the in-flight group before exiting.
fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        let groups = interrupt_live_groups();
        warn!(groups, "interrupted; killed in-flight child processes");
        std::process::exit(130);
    })
    .context("installing interrupt handler")
}

fn load_settings(path: Option<&PathBuf>) -> Result<SweepSettings> {
    match path {
        Some(path) => SweepSettings::load(path),
        None => Ok(SweepSettings::default()),
    }
}

fn timeout_secs(secs: u64) -> Option<u64> {
    (secs > 0).then_some(secs)
}

/// Apply command-line overrides on top of loaded settings.
pub fn settings_from_args(args: &RunArgs) -> Result<SweepSettings> {
    let mut settings = load_settings(args.config.as_ref())?;
    if let Some(value) = args.dataset_type {
        settings.dataset_type = value;
    }
    if let Some(value) = args.source {
        settings.source = value;
    }
    if let Some(dir) = &args.tempdir {
        settings.temp_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.outdir {
        settings.out_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.project_dir {
        settings.project_dir = dir.clone();
    }
    if let Some(dir) = &args.datasets_root {
        settings.datasets_root = dir.clone();
    }
    if let Some(dir) = &args.models_root {
        settings.models_root = dir.clone();
    }
    if let Some(root) = &args.compiler_root {
        settings.toolchain.compiler_root = Some(root.clone());
    }
    if let Some(secs) = args.build_timeout {
        settings.build_timeout_secs = timeout_secs(secs);
    }
    if let Some(secs) = args.exec_timeout {
        settings.execute_timeout_secs = timeout_secs(secs);
    }
    if let Some(value) = args.num_outputs {
        settings.num_outputs = value;
    }
    if let Some(value) = args.max_scale_factor {
        settings.max_scale_factor = Some(value);
    }
    settings.load_scale_factor |= args.load_sf;
    settings.use_alternate_toolchain |= args.alternate_toolchain;
    settings.allow_unknown_datasets |= args.allow_unknown_datasets;
    Ok(settings)
}

pub fn selections_from_args(args: &RunArgs, settings: &SweepSettings) -> Result<AxisSelections> {
    let datasets = args
        .dataset
        .iter()
        .map(|name| {
            if settings.allow_unknown_datasets {
                Dataset::custom(name.as_str())
            } else {
                Dataset::known(name)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AxisSelections::new()
        .algorithms(args.algo.clone())
        .encodings(args.encoding.clone())
        .datasets(datasets)
        .targets(args.target.clone())
        .metrics(args.metric.clone()))
}

fn run_sweep(args: RunArgs) -> Result<()> {
    let settings = settings_from_args(&args)?;
    let selections = selections_from_args(&args, &settings)?;
    let dataset_type = settings.dataset_type;
    let orchestrator = SweepOrchestrator::new(settings);

    let reports = orchestrator.run_sweep_with(&selections, |event| match event {
        SweepEvent::PointStarted { config, .. } => {
            println!("\n========================================");
            println!("Executing on {config}");
            println!("========================================\n");
        }
        SweepEvent::PointFinished { index, total, report } => {
            let build = if report.build_succeeded { "success" } else { "FAILED" };
            println!("Build... {build}");
            if report.build_succeeded {
                let exec = if report.execute_succeeded { "success" } else { "FAILED" };
                println!("Execution... {exec}");
            }
            match report.metric_value {
                Some(value) => println!("[{}/{}] accuracy = {value:.4}", index + 1, total),
                None => println!(
                    "[{}/{}] {}: {}",
                    index + 1,
                    total,
                    report.outcome.label(),
                    report.outcome.reason().unwrap_or("")
                ),
            }
        }
    })?;

    let summary = SweepSummary::new(
        orchestrator.resolver().host(),
        orchestrator.toolchain().ok().cloned(),
        dataset_type,
        &reports,
    );
    println!("\n{}", summary.render_table());

    if let Some(path) = &args.baseline {
        if path.exists() {
            let baseline = SweepSummary::load(path)
                .with_context(|| format!("loading baseline {}", path.display()))?;
            for (slug, delta) in summary.diff(&baseline) {
                println!("Δ {slug}: metric={:+.4}", delta.metric_delta);
            }
        } else {
            info!(path = %path.display(), "baseline report not found; skipping diff");
        }
    }

    if let Some(path) = &args.report {
        summary.save(path)?;
        info!(path = %path.display(), "wrote sweep summary");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).expect("valid arguments");
        match cli.command {
            Command::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn repeated_and_comma_separated_axes() -> Result<()> {
        let args = parse(&[
            "edgesweep", "run", "-a", "bonsai,protonn", "-e", "fixed", "-e", "float", "-d",
            "cifar-binary",
        ]);
        let settings = settings_from_args(&args)?;
        let selections = selections_from_args(&args, &settings)?;
        assert_eq!(selections.algorithms, [Algorithm::Bonsai, Algorithm::Protonn]);
        assert_eq!(selections.encodings, [Encoding::Fixed, Encoding::Float]);
        assert_eq!(selections.point_count(), 4);
        Ok(())
    }

    #[test]
    fn unknown_dataset_needs_opt_in() -> Result<()> {
        let args = parse(&["edgesweep", "run", "-d", "imagenet"]);
        let settings = settings_from_args(&args)?;
        assert!(selections_from_args(&args, &settings).is_err());

        let args = parse(&["edgesweep", "run", "-d", "imagenet", "--allow-unknown-datasets"]);
        let settings = settings_from_args(&args)?;
        let selections = selections_from_args(&args, &settings)?;
        assert_eq!(selections.datasets[0].as_str(), "imagenet");
        Ok(())
    }

    #[test]
    fn flags_override_settings() -> Result<()> {
        let args = parse(&[
            "edgesweep",
            "run",
            "--source",
            "onnx",
            "--build-timeout",
            "0",
            "--exec-timeout",
            "30",
            "--load-sf",
            "--max-scale-factor",
            "-3",
        ]);
        let settings = settings_from_args(&args)?;
        assert_eq!(settings.source, ModelSource::Onnx);
        assert_eq!(settings.build_timeout_secs, None);
        assert_eq!(settings.execute_timeout_secs, Some(30));
        assert!(settings.load_scale_factor);
        assert_eq!(settings.max_scale_factor, Some(-3));
        Ok(())
    }

    #[test]
    fn invalid_axis_value_is_rejected() {
        assert!(Cli::try_parse_from(["edgesweep", "run", "-t", "riscv"]).is_err());
    }
}

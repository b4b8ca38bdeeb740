#![cfg(unix)]

use anyhow::Result;
use edgesweep_core::{Algorithm, Dataset, Encoding, Metric, Target};
use edgesweep_orchestrator::{
    AxisSelections, ProducerCommand, SweepError, SweepOrchestrator, SweepSettings, SweepSummary,
};
use edgesweep_runner::{RunOutcome, EXEC_LOG};
use edgesweep_toolchain::{HostPlatform, ToolchainError, ToolchainResolver, ToolchainSearch};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const PREDICTOR: &str = "#!/bin/sh
mkdir -p \"output/$1-$2\"
echo 0.9231 > \"output/$1-$2/stats-$3.txt\"
echo \"predicted $1 $2 $3\"
";

const WORKING_MAKE: &str = "#!/bin/sh
echo building predictor
cp predictor.sh Predictor && chmod +x Predictor
";

/// Writes stats on its first call only.
const ONE_SHOT_PREDICTOR: &str = "#!/bin/sh
if [ ! -e ran-once ]; then
  touch ran-once
  mkdir -p \"output/$1-$2\"
  echo 0.9231 > \"output/$1-$2/stats-$3.txt\"
fi
";

const BROKEN_MAKE: &str = "#!/bin/sh
echo 'error: predictor.cpp: no such file'
exit 2
";

fn write_script(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Work tree with a fake `make` in the project directory.
struct Sandbox {
    _dir: tempfile::TempDir,
    root: PathBuf,
    settings: SweepSettings,
}

impl Sandbox {
    fn new(make: &str) -> Result<Self> {
        Self::with_predictor(make, PREDICTOR)
    }

    fn with_predictor(make: &str, predictor: &str) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().to_path_buf();
        let project = root.join("predictor");
        fs::create_dir_all(&project)?;
        write_script(&project.join("predictor.sh"), predictor)?;
        let make_program = project.join("fake-make");
        write_script(&make_program, make)?;

        let settings = SweepSettings {
            work_dir: root.clone(),
            project_dir: project,
            datasets_root: root.join("datasets"),
            models_root: root.join("model"),
            toolchain: ToolchainSearch {
                make_program,
                ..ToolchainSearch::default()
            },
            build_timeout_secs: Some(10),
            execute_timeout_secs: Some(10),
            ..SweepSettings::default()
        };

        Ok(Self {
            _dir: dir,
            root,
            settings,
        })
    }

    fn with_inputs(self, algorithms: &[Algorithm], datasets: &[&str]) -> Result<Self> {
        for algorithm in algorithms {
            for dataset in datasets {
                fs::create_dir_all(self.settings.datasets_root.join(algorithm.as_str()).join(dataset))?;
                fs::create_dir_all(self.settings.models_root.join(algorithm.as_str()).join(dataset))?;
            }
        }
        Ok(self)
    }

    fn orchestrator(&self) -> SweepOrchestrator {
        SweepOrchestrator::new(self.settings.clone()).with_resolver(ToolchainResolver::new(
            HostPlatform::Unix,
            false,
            self.settings.toolchain.clone(),
        ))
    }
}

fn find_named(dir: &Path, name: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                found.extend(find_named(&path, name));
            } else if path.file_name().is_some_and(|file| file == name) {
                found.push(path);
            }
        }
    }
    found
}

#[test]
fn single_point_sweep_reads_metric() -> Result<()> {
    let sandbox = Sandbox::new(WORKING_MAKE)?.with_inputs(&[Algorithm::Protonn], &["cifar-binary"])?;
    let reports = sandbox.orchestrator().run_sweep(&AxisSelections::new())?;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.outcome, RunOutcome::Done);
    assert_eq!(report.metric_value, Some(0.9231));

    let exec_log = report.logs.exec.as_ref().expect("exec log recorded");
    assert!(exec_log.ends_with(Path::new("protonn-fixed-cifar-binary-x86-acc").join(EXEC_LOG)));
    assert_eq!(
        fs::read_to_string(exec_log)?.trim(),
        "predicted protonn protonn_fixed_int16 testing"
    );
    let build_log = report.logs.build.as_ref().expect("build log recorded");
    assert!(fs::read_to_string(build_log)?.contains("building predictor"));
    Ok(())
}

#[test]
fn cross_product_runs_every_point() -> Result<()> {
    let algorithms = [Algorithm::Bonsai, Algorithm::Protonn];
    let sandbox = Sandbox::new(WORKING_MAKE)?.with_inputs(&algorithms, &["cifar-binary"])?;
    let selections = AxisSelections::new()
        .algorithms(algorithms.to_vec())
        .encodings(vec![Encoding::Fixed, Encoding::Float]);

    let reports = sandbox.orchestrator().run_sweep(&selections)?;
    let slugs: Vec<String> = reports.iter().map(|report| report.configuration.slug()).collect();
    assert_eq!(
        slugs,
        [
            "bonsai-fixed-cifar-binary-x86-acc",
            "bonsai-float-cifar-binary-x86-acc",
            "protonn-fixed-cifar-binary-x86-acc",
            "protonn-float-cifar-binary-x86-acc",
        ]
    );
    assert!(reports.iter().all(|report| report.metric_value == Some(0.9231)));
    assert!(sandbox
        .settings
        .project_dir
        .join("output")
        .join("bonsai-bonsai_float_float")
        .join("stats-testing.txt")
        .is_file());
    Ok(())
}

#[test]
fn builder_call_order_does_not_change_the_plan() -> Result<()> {
    let sandbox = Sandbox::new(WORKING_MAKE)?;
    let orchestrator = sandbox.orchestrator();

    let first = AxisSelections::new()
        .targets(vec![Target::X86, Target::M3])
        .metrics(Metric::Disagree)
        .algorithms(vec![Algorithm::Fastgrnn, Algorithm::Rnnpool]);
    let second = AxisSelections::new()
        .algorithms(vec![Algorithm::Fastgrnn, Algorithm::Rnnpool])
        .metrics(Metric::Disagree)
        .targets(vec![Target::X86, Target::M3]);

    assert_eq!(orchestrator.plan(&first)?, orchestrator.plan(&second)?);
    assert_eq!(orchestrator.plan(&first)?.len(), 4);
    Ok(())
}

#[test]
fn missing_native_toolchain_aborts_before_building() -> Result<()> {
    let sandbox = Sandbox::new(WORKING_MAKE)?.with_inputs(&[Algorithm::Protonn], &["cifar-binary"])?;
    let search = ToolchainSearch {
        msbuild_candidates: vec![sandbox.root.join("vs").join("MSBuild.exe")],
        ..ToolchainSearch::default()
    };
    let orchestrator = SweepOrchestrator::new(sandbox.settings.clone())
        .with_resolver(ToolchainResolver::new(HostPlatform::Windows, false, search));

    let err = orchestrator.run_sweep(&AxisSelections::new()).unwrap_err();
    match &err {
        SweepError::Toolchain(ToolchainError::NotFound { tool, candidates }) => {
            assert_eq!(*tool, "MSBuild.exe");
            assert_eq!(candidates.len(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("Please change the path and run again"));
    assert!(find_named(&sandbox.root, "msbuild.txt").is_empty());
    Ok(())
}

#[test]
fn failed_build_never_executes() -> Result<()> {
    let sandbox = Sandbox::new(BROKEN_MAKE)?.with_inputs(&[Algorithm::Bonsai], &["cifar-binary"])?;
    let reports = sandbox
        .orchestrator()
        .run_sweep(&AxisSelections::new().algorithms(Algorithm::Bonsai))?;

    let report = &reports[0];
    assert!(!report.build_succeeded);
    assert!(matches!(&report.outcome, RunOutcome::BuildFailed { reason } if reason.contains("exit status 2")));
    assert!(report.metric_value.is_none());
    assert_eq!(find_named(&sandbox.root, "msbuild.txt").len(), 1);
    assert!(find_named(&sandbox.root, EXEC_LOG).is_empty());
    Ok(())
}

#[test]
fn repeated_sweeps_agree() -> Result<()> {
    let sandbox = Sandbox::new(WORKING_MAKE)?.with_inputs(&[Algorithm::Protonn], &["cifar-binary", "HAR-2"])?;
    let selections = AxisSelections::new().datasets(vec![
        "cifar-binary".parse::<Dataset>()?,
        "HAR-2".parse::<Dataset>()?,
    ]);

    let first = sandbox.orchestrator().run_sweep(&selections)?;
    let second = sandbox.orchestrator().run_sweep(&selections)?;
    let values = |reports: &[edgesweep_runner::RunReport]| {
        reports
            .iter()
            .map(|report| (report.configuration.slug(), report.metric_value))
            .collect::<Vec<_>>()
    };
    assert_eq!(values(&first), values(&second));
    assert_eq!(first.len(), 2);
    Ok(())
}

#[test]
fn stats_from_an_earlier_point_are_never_reported() -> Result<()> {
    let sandbox = Sandbox::with_predictor(WORKING_MAKE, ONE_SHOT_PREDICTOR)?
        .with_inputs(&[Algorithm::Protonn], &["cifar-binary", "HAR-2"])?;
    let selections = AxisSelections::new().datasets(vec![
        "cifar-binary".parse::<Dataset>()?,
        "HAR-2".parse::<Dataset>()?,
    ]);

    let reports = sandbox.orchestrator().run_sweep(&selections)?;
    assert_eq!(reports[0].metric_value, Some(0.9231));
    assert_eq!(reports[1].configuration.slug(), "protonn-fixed-HAR-2-x86-acc");
    assert!(reports[1].execute_succeeded);
    assert!(reports[1].metric_value.is_none());
    assert!(matches!(&reports[1].outcome, RunOutcome::ParseFailed { reason } if reason.contains("not found")));
    Ok(())
}

/// Settings file for the `edgesweep` binary, with inputs for the default point.
fn write_cli_settings(sandbox: &Sandbox, settings: &SweepSettings) -> Result<PathBuf> {
    let path = sandbox.root.join("sweep.json");
    settings.save(&path)?;
    Ok(path)
}

#[test]
fn relative_input_roots_reach_the_generator() -> Result<()> {
    let sandbox = Sandbox::new(WORKING_MAKE)?.with_inputs(&[Algorithm::Protonn], &["cifar-binary"])?;
    let settings = SweepSettings {
        work_dir: PathBuf::from("."),
        datasets_root: PathBuf::from("datasets"),
        models_root: PathBuf::from("model"),
        producer: Some(ProducerCommand {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".into(),
                r#"test -d "$5" && test -d "$(dirname "$6")" || exit 7"#.into(),
                "codegen".into(),
            ],
        }),
        ..sandbox.settings.clone()
    };
    let config = write_cli_settings(&sandbox, &settings)?;
    let report = sandbox.root.join("report.json");

    let status = Command::new(env!("CARGO_BIN_EXE_edgesweep"))
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--report")
        .arg(&report)
        .current_dir(&sandbox.root)
        .stdout(Stdio::null())
        .status()?;
    assert!(status.success());

    let summary = SweepSummary::load(&report)?;
    assert_eq!(summary.points.len(), 1);
    assert_eq!(summary.points[0].status, "done", "{:?}", summary.points[0].reason);
    assert_eq!(summary.points[0].metric_value, Some(0.9231));
    Ok(())
}

/// Zombies count as gone: nothing in a test sandbox reaps orphans.
#[cfg(target_os = "linux")]
fn is_running(pid: &str) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(") ")
            .map_or(false, |(_, rest)| !rest.starts_with('Z')),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn wait_for(what: &str, mut ready: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !ready() {
        if Instant::now() >= deadline {
            anyhow::bail!("timed out waiting for {what}");
        }
        thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn termination_signal_kills_the_in_flight_build() -> Result<()> {
    const HANGING_MAKE: &str = "#!/bin/sh
echo $$ > make.pid
sleep 30 &
echo $! > sleep.pid
wait
";
    let sandbox = Sandbox::new(HANGING_MAKE)?.with_inputs(&[Algorithm::Protonn], &["cifar-binary"])?;
    let settings = SweepSettings {
        build_timeout_secs: Some(120),
        ..sandbox.settings.clone()
    };
    let config = write_cli_settings(&sandbox, &settings)?;

    let mut sweep = Command::new(env!("CARGO_BIN_EXE_edgesweep"))
        .arg("run")
        .arg("--config")
        .arg(&config)
        .current_dir(&sandbox.root)
        .stdout(Stdio::null())
        .spawn()?;

    let project = &sandbox.settings.project_dir;
    let read_pid = |name: &str| fs::read_to_string(project.join(name)).unwrap_or_default().trim().to_string();
    let started = wait_for("the build to start", || !read_pid("sleep.pid").is_empty());
    if started.is_err() {
        let _ = sweep.kill();
        let _ = sweep.wait();
    }
    started?;
    let (make, sleep) = (read_pid("make.pid"), read_pid("sleep.pid"));
    assert!(is_running(&make) && is_running(&sleep));

    let signalled = Command::new("kill")
        .arg("-TERM")
        .arg(sweep.id().to_string())
        .status()?;
    assert!(signalled.success());

    let mut exit = None;
    wait_for("edgesweep to exit", || {
        exit = sweep.try_wait().ok().flatten();
        exit.is_some()
    })?;
    assert!(!exit.is_some_and(|status| status.success()));

    wait_for("the build group to die", || !is_running(&make) && !is_running(&sleep))?;
    Ok(())
}

//! Build strategies: how each toolchain kind builds and launches the
//! generated predictor project.

use crate::resolver::{ToolchainDescriptor, ToolchainKind};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Project file the native builder consumes.
pub const PROJECT_FILE: &str = "Predictor.vcxproj";

/// Platform-specific build and launch recipe, selected once per sweep.
pub trait BuildStrategy: Send + Sync {
    fn kind(&self) -> ToolchainKind;

    /// Name of the build log written into each point's output directory.
    fn build_log_name(&self) -> &'static str;

    /// Command that builds the project found in `project_dir`.
    fn build_command(&self, project_dir: &Path) -> Command;

    /// Location of the built artifact.
    fn artifact_path(&self, project_dir: &Path) -> PathBuf;

    /// Command that runs the built artifact with positional `args`.
    fn execute_command(&self, project_dir: &Path, args: &[&str]) -> Command {
        let mut command = Command::new(self.artifact_path(project_dir));
        command.args(args).current_dir(project_dir);
        command
    }
}

pub type DynBuildStrategy = Box<dyn BuildStrategy>;

/// Pick the strategy that matches a resolved toolchain.
pub fn strategy_for(descriptor: &ToolchainDescriptor) -> DynBuildStrategy {
    match descriptor.kind {
        ToolchainKind::Native => Box::new(NativeBuild::new(descriptor.executable_path.clone())),
        ToolchainKind::Make => Box::new(MakeBuild::new(descriptor.executable_path.clone())),
        ToolchainKind::Cross => Box::new(CrossBuild::new(
            descriptor.executable_path.clone(),
            descriptor.compiler_root.clone(),
        )),
    }
}

/// MSBuild against the Visual Studio project, Release|x64.
pub struct NativeBuild {
    msbuild: PathBuf,
}

impl NativeBuild {
    pub fn new(msbuild: PathBuf) -> Self {
        Self { msbuild }
    }
}

impl BuildStrategy for NativeBuild {
    fn kind(&self) -> ToolchainKind {
        ToolchainKind::Native
    }

    fn build_log_name(&self) -> &'static str {
        "msbuild.txt"
    }

    fn build_command(&self, project_dir: &Path) -> Command {
        let mut command = Command::new(&self.msbuild);
        command
            .args([
                PROJECT_FILE,
                "/t:Build",
                "/p:Configuration=Release",
                "/p:Platform=x64",
            ])
            .current_dir(project_dir);
        command
    }

    fn artifact_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join("x64").join("Release").join("Predictor.exe")
    }
}

/// Zero-argument make in the project directory.
pub struct MakeBuild {
    make: PathBuf,
}

impl MakeBuild {
    pub fn new(make: PathBuf) -> Self {
        Self { make }
    }
}

impl BuildStrategy for MakeBuild {
    fn kind(&self) -> ToolchainKind {
        ToolchainKind::Make
    }

    fn build_log_name(&self) -> &'static str {
        "msbuild.txt"
    }

    fn build_command(&self, project_dir: &Path) -> Command {
        let mut command = Command::new(&self.make);
        command.current_dir(project_dir);
        command
    }

    fn artifact_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join("Predictor")
    }
}

/// MinGW make, optionally with the compiler root put first on `PATH`.
pub struct CrossBuild {
    make: PathBuf,
    compiler_root: Option<PathBuf>,
}

impl CrossBuild {
    pub fn new(make: PathBuf, compiler_root: Option<PathBuf>) -> Self {
        Self {
            make,
            compiler_root: compiler_root.filter(|root| !root.as_os_str().is_empty()),
        }
    }

    /// `PATH` with the compiler root prepended, or `None` when unchanged.
    pub fn augmented_path(&self) -> Option<OsString> {
        let root = self.compiler_root.as_ref()?;
        let mut entries = vec![root.clone()];
        if let Some(existing) = std::env::var_os("PATH") {
            entries.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(entries).ok()
    }
}

impl BuildStrategy for CrossBuild {
    fn kind(&self) -> ToolchainKind {
        ToolchainKind::Cross
    }

    fn build_log_name(&self) -> &'static str {
        "gccbuild.txt"
    }

    fn build_command(&self, project_dir: &Path) -> Command {
        let mut command = Command::new(&self.make);
        command.current_dir(project_dir);
        if let Some(path) = self.augmented_path() {
            command.env("PATH", path);
        }
        command
    }

    fn artifact_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join("Predictor.exe")
    }
}

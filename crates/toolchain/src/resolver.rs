//! Host probing and one-shot toolchain lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Platform the sweep runs on. Windows is the native host for the generated
/// predictor project; everything else goes through make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    Windows,
    Unix,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Unix
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, HostPlatform::Windows)
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPlatform::Windows => f.write_str("windows"),
            HostPlatform::Unix => f.write_str("unix"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    /// Project-file builder (MSBuild) on the native host.
    Native,
    /// MinGW make on the native host.
    Cross,
    /// Plain make on any other host.
    Make,
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolchainKind::Native => f.write_str("native"),
            ToolchainKind::Cross => f.write_str("cross"),
            ToolchainKind::Make => f.write_str("make"),
        }
    }
}

/// Resolved build tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainDescriptor {
    pub kind: ToolchainKind,
    pub executable_path: PathBuf,
    /// Directory prepended to `PATH` when the cross toolchain runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_root: Option<PathBuf>,
}

impl ToolchainDescriptor {
    pub fn new(kind: ToolchainKind, executable_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            executable_path: executable_path.into(),
            compiler_root: None,
        }
    }

    pub fn with_compiler_root(mut self, root: Option<PathBuf>) -> Self {
        self.compiler_root = root;
        self
    }
}

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("{tool} not found at the following locations:\n{}\nPlease change the path and run again", format_candidates(.candidates))]
    NotFound {
        tool: &'static str,
        candidates: Vec<PathBuf>,
    },
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        return "  (no candidate paths configured)".to_string();
    }
    candidates
        .iter()
        .map(|path| format!("  {}", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Candidate locations and program names searched during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSearch {
    pub msbuild_candidates: Vec<PathBuf>,
    pub cross_make_candidates: Vec<PathBuf>,
    pub make_program: PathBuf,
    pub compiler_root: Option<PathBuf>,
}

impl Default for ToolchainSearch {
    fn default() -> Self {
        Self {
            msbuild_candidates: default_msbuild_candidates(),
            cross_make_candidates: default_cross_make_candidates(),
            make_program: PathBuf::from("make"),
            compiler_root: None,
        }
    }
}

pub fn default_msbuild_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for (year, base) in [
        ("2022", r"C:\Program Files\Microsoft Visual Studio"),
        ("2019", r"C:\Program Files (x86)\Microsoft Visual Studio"),
        ("2017", r"C:\Program Files (x86)\Microsoft Visual Studio"),
    ] {
        let bin = if year == "2017" {
            r"MSBuild\15.0\Bin\MSBuild.exe"
        } else {
            r"MSBuild\Current\Bin\MSBuild.exe"
        };
        for edition in ["Enterprise", "Professional", "Community", "BuildTools"] {
            candidates.push(PathBuf::from(format!(r"{base}\{year}\{edition}\{bin}")));
        }
    }
    candidates
}

pub fn default_cross_make_candidates() -> Vec<PathBuf> {
    [
        r"C:\MinGW\bin\mingw32-make.exe",
        r"C:\msys64\mingw64\bin\mingw32-make.exe",
        r"C:\msys64\ucrt64\bin\mingw32-make.exe",
        r"C:\Program Files\mingw-w64\x86_64-8.1.0-posix-seh-rt_v6-rev0\mingw64\bin\mingw32-make.exe",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

pub struct ToolchainResolver {
    host: HostPlatform,
    use_alternate_toolchain: bool,
    search: ToolchainSearch,
}

impl ToolchainResolver {
    pub fn new(host: HostPlatform, use_alternate_toolchain: bool, search: ToolchainSearch) -> Self {
        Self {
            host,
            use_alternate_toolchain,
            search,
        }
    }

    pub fn for_current_host(use_alternate_toolchain: bool, search: ToolchainSearch) -> Self {
        Self::new(HostPlatform::current(), use_alternate_toolchain, search)
    }

    pub fn host(&self) -> HostPlatform {
        self.host
    }

    pub fn resolve(&self) -> Result<ToolchainDescriptor, ToolchainError> {
        let descriptor = if !self.host.is_native() {
            ToolchainDescriptor::new(ToolchainKind::Make, self.search.make_program.clone())
        } else if self.use_alternate_toolchain {
            let path = first_existing("mingw32-make.exe", &self.search.cross_make_candidates)?;
            ToolchainDescriptor::new(ToolchainKind::Cross, path)
                .with_compiler_root(self.search.compiler_root.clone())
        } else {
            let path = first_existing("MSBuild.exe", &self.search.msbuild_candidates)?;
            ToolchainDescriptor::new(ToolchainKind::Native, path)
        };

        info!(
            host = %self.host,
            kind = %descriptor.kind,
            path = %descriptor.executable_path.display(),
            "resolved toolchain"
        );
        Ok(descriptor)
    }
}

fn first_existing(tool: &'static str, candidates: &[PathBuf]) -> Result<PathBuf, ToolchainError> {
    for candidate in candidates {
        debug!(tool, candidate = %candidate.display(), "probing toolchain candidate");
        if is_file(candidate) {
            return Ok(candidate.clone());
        }
    }
    Err(ToolchainError::NotFound {
        tool,
        candidates: candidates.to_vec(),
    })
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|meta| meta.is_file()).unwrap_or(false)
}

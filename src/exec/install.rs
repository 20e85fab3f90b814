// src/exec/install.rs

//! Installing a pack's Python requirements.
//!
//! Uses the same interpreter resolution, launcher and pump as a runner
//! request. Nothing is written to the installer's stdin and its output is
//! returned as text rather than parsed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::errors::Result;

use super::interpreter::{InterpreterCandidate, ProbeSettings, resolve_interpreter};
use super::launcher::launch_with_args;
use super::pump::{PumpLimits, pump};

/// Replaced in install arguments by the absolute requirements path.
pub const REQUIREMENTS_PLACEHOLDER: &str = "{requirements}";

/// How requirements get installed.
#[derive(Debug, Clone)]
pub struct InstallSettings {
    /// Arguments after the interpreter, e.g. `-m pip install -r {requirements}`.
    pub args: Vec<String>,
    pub limits: PumpLimits,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            args: ["-m", "pip", "install", "-r", REQUIREMENTS_PLACEHOLDER]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            limits: PumpLimits {
                timeout: Duration::from_secs(180),
                ..PumpLimits::default()
            },
        }
    }
}

/// A pack whose requirements file is known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub pack_dir: PathBuf,
    pub requirements: PathBuf,
}

/// What the installer printed and how it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub code: i32,
    pub log: String,
    pub stderr: String,
}

impl InstallOutcome {
    pub fn succeeded(&self) -> bool {
        self.code == 0
    }
}

/// Expand the install argument template for one requirements file.
pub fn install_args(template: &[String], requirements: &Path) -> Vec<OsString> {
    template
        .iter()
        .map(|arg| {
            if arg == REQUIREMENTS_PLACEHOLDER {
                requirements.as_os_str().to_os_string()
            } else {
                OsString::from(arg.replace(
                    REQUIREMENTS_PLACEHOLDER,
                    &requirements.to_string_lossy(),
                ))
            }
        })
        .collect()
}

/// Resolve an interpreter and run the installer in the pack directory.
///
/// A non-zero exit is an outcome, not an error; timeouts, spawn failures and
/// a missing interpreter are errors.
pub async fn install_requirements(
    interpreters: &[InterpreterCandidate],
    probe: &ProbeSettings,
    settings: &InstallSettings,
    target: &InstallTarget,
) -> Result<InstallOutcome> {
    let interpreter = resolve_interpreter(interpreters, probe).await?;
    let requirements = std::path::absolute(&target.requirements)?;
    let args = install_args(&settings.args, &requirements);

    let child = launch_with_args(&interpreter, &args, &target.pack_dir)?;
    let output = pump(child, &[], &settings.limits).await?;

    info!(
        pack_dir = %target.pack_dir.display(),
        exit_code = output.code,
        "requirements install finished"
    );

    Ok(InstallOutcome {
        code: output.code,
        log: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

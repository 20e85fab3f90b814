// src/exec/backend.rs

//! Pluggable runner backend abstraction.
//!
//! The HTTP layer talks to a `RunnerBackend` instead of spawning processes
//! itself. Production uses [`ProcessBackend`]; tests can swap in a backend
//! that records invocations and answers with canned values.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::{PacksSection, RunnerSection};
use crate::errors::Result;

use super::install::{InstallOutcome, InstallSettings, InstallTarget, install_requirements};
use super::interpreter::{InterpreterCandidate, ProbeSettings, resolve_interpreter};
use super::launcher::{RunTarget, ensure_runner_exists, launch};
use super::normalize::normalize;
use super::pump::{PumpLimits, pump};

/// Trait abstracting how one request is turned into a response value.
pub trait RunnerBackend: Send + Sync {
    /// Run `target` with `body` on stdin and return the runner's JSON.
    fn invoke(
        &self,
        target: RunTarget,
        body: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>>;

    /// Install a pack's requirements and report how the installer exited.
    fn install(
        &self,
        target: InstallTarget,
    ) -> Pin<Box<dyn Future<Output = Result<InstallOutcome>> + Send + '_>>;
}

/// Everything the real backend needs, derived from `[runner]`.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub interpreters: Vec<InterpreterCandidate>,
    pub probe: ProbeSettings,
    pub limits: PumpLimits,
    pub install: InstallSettings,
}

impl RunnerSettings {
    pub fn from_config(runner: &RunnerSection) -> Self {
        Self {
            interpreters: InterpreterCandidate::parse_all(&runner.interpreters),
            probe: ProbeSettings {
                args: runner.probe_args.clone(),
                timeout: runner.probe_timeout.as_duration(),
            },
            limits: PumpLimits {
                timeout: runner.timeout.as_duration(),
                max_output_bytes: runner.max_output_bytes,
                drain_grace: Duration::from_millis(100),
            },
            install: InstallSettings::default(),
        }
    }

    /// Take the install command and budget from `[packs]`. The output cap
    /// is shared with runner requests.
    pub fn with_install(mut self, packs: &PacksSection) -> Self {
        self.install = InstallSettings {
            args: packs.install_args.clone(),
            limits: PumpLimits {
                timeout: packs.install_timeout.as_duration(),
                ..self.limits.clone()
            },
        };
        self
    }
}

/// Real backend: one child process per invocation.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    settings: Arc<RunnerSettings>,
}

impl ProcessBackend {
    pub fn new(settings: RunnerSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }
}

impl RunnerBackend for ProcessBackend {
    fn invoke(
        &self,
        target: RunTarget,
        body: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
        Box::pin(async move { run_once(&self.settings, &target, &body).await })
    }

    fn install(
        &self,
        target: InstallTarget,
    ) -> Pin<Box<dyn Future<Output = Result<InstallOutcome>> + Send + '_>> {
        Box::pin(async move {
            install_requirements(
                &self.settings.interpreters,
                &self.settings.probe,
                &self.settings.install,
                &target,
            )
            .await
        })
    }
}

/// The full sequence for one request: check the script, resolve an
/// interpreter, spawn, pump, normalize.
pub async fn run_once(settings: &RunnerSettings, target: &RunTarget, body: &[u8]) -> Result<Value> {
    ensure_runner_exists(target).await?;
    let interpreter = resolve_interpreter(&settings.interpreters, &settings.probe).await?;
    let child = launch(&interpreter, target)?;
    let output = pump(child, body, &settings.limits).await?;

    debug!(
        exit_code = output.code,
        stdout_bytes = output.stdout.len(),
        "normalizing runner output"
    );
    normalize(output)
}

// src/exec/interpreter.rs

//! Interpreter discovery.
//!
//! Candidates are tried in order; the first whose version probe exits with
//! status 0 is used. Nothing is cached: every request probes again, so an
//! interpreter installed or removed while the bridge runs is picked up on
//! the next request.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{BridgeError, Result};

/// One interpreter invocation, e.g. `python3` or `py -3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterCandidate {
    program: String,
    args: Vec<String>,
}

impl InterpreterCandidate {
    /// Split an invocation string on whitespace. Returns `None` for a blank
    /// string.
    pub fn parse(invocation: &str) -> Option<Self> {
        let mut parts = invocation.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Parse a configured list, skipping blank entries.
    pub fn parse_all<S: AsRef<str>>(invocations: &[S]) -> Vec<Self> {
        invocations
            .iter()
            .filter_map(|s| Self::parse(s.as_ref()))
            .collect()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// A `Command` for this interpreter with its leading arguments applied.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for InterpreterCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a candidate is probed.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Appended to the candidate's own arguments (`-V` by default).
    pub args: Vec<String>,
    /// A probe still running after this long is killed and counts as failed.
    pub timeout: Duration,
}

/// Return the first candidate whose probe exits 0.
///
/// Probes run one after another and stop at the first success, so later
/// candidates may never be spawned.
pub async fn resolve_interpreter(
    candidates: &[InterpreterCandidate],
    probe: &ProbeSettings,
) -> Result<InterpreterCandidate> {
    for candidate in candidates {
        if probe_candidate(candidate, probe).await {
            info!(interpreter = %candidate, "resolved runner interpreter");
            return Ok(candidate.clone());
        }
    }

    warn!(
        candidates = candidates.len(),
        "no interpreter candidate passed its version probe"
    );
    Err(BridgeError::NoInterpreterFound)
}

async fn probe_candidate(candidate: &InterpreterCandidate, probe: &ProbeSettings) -> bool {
    let mut cmd = candidate.command();
    cmd.args(&probe.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(interpreter = %candidate, error = %e, "probe could not be spawned");
            return false;
        }
    };

    match tokio::time::timeout(probe.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(
                interpreter = %candidate,
                exit_code = status.code().unwrap_or(-1),
                "probe finished"
            );
            status.success()
        }
        Ok(Err(e)) => {
            debug!(interpreter = %candidate, error = %e, "waiting for probe failed");
            false
        }
        Err(_) => {
            warn!(
                interpreter = %candidate,
                timeout_ms = probe.timeout.as_millis() as u64,
                "probe timed out; killing it"
            );
            if let Err(e) = child.kill().await {
                debug!(interpreter = %candidate, error = %e, "failed to kill stuck probe");
            }
            false
        }
    }
}

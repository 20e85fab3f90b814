// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs the runner script for one request, using
//! `tokio::process::Command`, and turns what it printed into a JSON value.
//!
//! - [`interpreter`] finds a working interpreter by probing candidates.
//! - [`launcher`] checks the script and spawns it with piped stdio.
//! - [`pump`] writes the request, drains stdout/stderr and enforces the
//!   timeout and output cap.
//! - [`install`] runs a pack's requirements installer through the same
//!   resolver, launcher and pump.
//! - [`normalize`] maps exit code + output to a value or an error.
//! - [`backend`] provides the `RunnerBackend` trait and the concrete
//!   `ProcessBackend` used in production, which tests can replace.

pub mod backend;
pub mod install;
pub mod interpreter;
pub mod launcher;
pub mod normalize;
pub mod pump;

pub use backend::{ProcessBackend, RunnerBackend, RunnerSettings, run_once};
pub use install::{InstallOutcome, InstallSettings, InstallTarget, install_requirements};
pub use interpreter::{InterpreterCandidate, ProbeSettings, resolve_interpreter};
pub use launcher::{RunTarget, ensure_runner_exists, launch, launch_with_args};
pub use normalize::normalize;
pub use pump::{PumpLimits, RunOutput, pump};

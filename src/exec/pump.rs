// src/exec/pump.rs

//! Bounded-time conversation with a runner process.
//!
//! The request body is written to stdin and stdin is closed before anything
//! is read back; the runner sees end-of-input as "request complete". After
//! that, stdout and stderr are drained concurrently from a single task with
//! `tokio::select!`, so a runner that fills one pipe while we wait on the
//! other cannot deadlock us.
//!
//! Whatever happens, the child has exited or been killed, and reaped, by the
//! time [`pump`] returns.

use std::io::ErrorKind;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::{BridgeError, Result};

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Limits applied to one runner invocation.
#[derive(Debug, Clone)]
pub struct PumpLimits {
    /// Wall-clock budget from the start of the pump until the child exits.
    pub timeout: Duration,
    /// Cap on stdout + stderr bytes kept in memory.
    pub max_output_bytes: usize,
    /// After exit, how long to keep reading for bytes still in flight. A
    /// background process that inherited the pipes would otherwise hold
    /// them open indefinitely.
    pub drain_grace: Duration,
}

impl Default for PumpLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_output_bytes: 16 * 1024 * 1024,
            drain_grace: Duration::from_millis(100),
        }
    }
}

/// Everything the runner produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code; `-1` when the process was ended by a signal.
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Feed `body` to the child and collect its output until it exits.
///
/// Fails with `Timeout` (carrying stderr captured so far) when the child
/// outlives `limits.timeout`, and with `OutputTooLarge` when it writes more
/// than `limits.max_output_bytes`. In both cases the child is killed.
pub async fn pump(mut child: Child, body: &[u8], limits: &PumpLimits) -> Result<RunOutput> {
    let pid = child.id().unwrap_or_default();
    let started = Instant::now();

    // Huge configured timeouts saturate instead of overflowing the clock.
    let deadline = started
        .checked_add(limits.timeout)
        .unwrap_or_else(|| started + FAR_FUTURE);
    let result = drive(&mut child, body, limits, deadline).await;

    if result.is_err() {
        terminate(&mut child, pid).await;
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(output) => info!(
            pid,
            exit_code = output.code,
            elapsed_ms,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "runner process exited"
        ),
        Err(BridgeError::Timeout { .. }) => warn!(
            pid,
            elapsed_ms,
            timeout_ms = limits.timeout.as_millis() as u64,
            "runner timed out; process killed"
        ),
        Err(err) => warn!(pid, elapsed_ms, error = %err, "runner aborted; process killed"),
    }

    result
}

async fn drive(
    child: &mut Child,
    body: &[u8],
    limits: &PumpLimits,
    deadline: Instant,
) -> Result<RunOutput> {
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("runner stdout is not piped"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("runner stderr is not piped"))?;

    if let Some(stdin) = child.stdin.take() {
        match tokio::time::timeout_at(deadline, write_request(stdin, body)).await {
            Ok(Ok(())) => {}
            // The runner exited (or closed stdin) without reading everything.
            // Its exit status and output still decide the outcome.
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(error = %e, "runner closed stdin before the request was fully written");
            }
            Ok(Err(e)) => return Err(BridgeError::IoError(e)),
            Err(_) => {
                return Err(BridgeError::Timeout {
                    stderr: String::new(),
                });
            }
        }
    }

    let mut capture = Capture::new(limits.max_output_bytes);
    let timer = tokio::time::sleep_until(deadline);
    tokio::pin!(timer);

    let status: ExitStatus = loop {
        tokio::select! {
            read = stdout.read_buf(&mut capture.stdout), if capture.stdout_open => {
                if read? == 0 {
                    capture.stdout_open = false;
                }
            }
            read = stderr.read_buf(&mut capture.stderr), if capture.stderr_open => {
                if read? == 0 {
                    capture.stderr_open = false;
                }
            }
            exited = child.wait() => break exited?,
            () = &mut timer => {
                return Err(BridgeError::Timeout {
                    stderr: String::from_utf8_lossy(&capture.stderr).into_owned(),
                });
            }
        }

        capture.check_limit()?;
    };

    // Final drain: bytes written just before exit may still sit in the pipes.
    let drained = tokio::time::timeout(
        limits.drain_grace,
        drain_remaining(&mut stdout, &mut stderr, &mut capture),
    )
    .await;
    match drained {
        Ok(result) => result?,
        Err(_) => debug!("pipes still open after runner exit; keeping output captured so far"),
    }

    drop(stdout);
    drop(stderr);

    Ok(RunOutput {
        code: status.code().unwrap_or(-1),
        stdout: capture.stdout,
        stderr: capture.stderr,
    })
}

async fn write_request(mut stdin: ChildStdin, body: &[u8]) -> std::io::Result<()> {
    stdin.write_all(body).await?;
    stdin.flush().await?;
    // Dropping the handle closes the pipe, which is the runner's EOF.
    drop(stdin);
    Ok(())
}

async fn drain_remaining(
    stdout: &mut ChildStdout,
    stderr: &mut ChildStderr,
    capture: &mut Capture,
) -> Result<()> {
    while !capture.is_drained() {
        tokio::select! {
            read = stdout.read_buf(&mut capture.stdout), if capture.stdout_open => {
                if read? == 0 {
                    capture.stdout_open = false;
                }
            }
            read = stderr.read_buf(&mut capture.stderr), if capture.stderr_open => {
                if read? == 0 {
                    capture.stderr_open = false;
                }
            }
        }

        capture.check_limit()?;
    }
    Ok(())
}

/// Kill and reap the child unless it already exited.
async fn terminate(child: &mut Child, pid: u32) {
    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            if let Err(e) = child.kill().await {
                warn!(pid, error = %e, "failed to kill runner process");
            }
        }
    }
}

struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    stdout_open: bool,
    stderr_open: bool,
    limit: usize,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            stdout_open: true,
            stderr_open: true,
            limit,
        }
    }

    fn is_drained(&self) -> bool {
        !self.stdout_open && !self.stderr_open
    }

    fn check_limit(&self) -> Result<()> {
        if self.stdout.len() + self.stderr.len() > self.limit {
            return Err(BridgeError::OutputTooLarge { limit: self.limit });
        }
        Ok(())
    }
}

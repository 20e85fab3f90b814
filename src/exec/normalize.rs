// src/exec/normalize.rs

//! Turning raw runner output into the response value.
//!
//! Valid JSON on stdout wins over the exit code: a runner that exits 1 but
//! prints `{"ok": true}` is passed through untouched. Only a non-zero exit
//! with nothing on stdout is reported as a failed run.

use serde_json::Value;

use crate::errors::{BridgeError, Result};
use crate::exec::pump::RunOutput;

pub fn normalize(output: RunOutput) -> Result<Value> {
    let stdout = String::from_utf8_lossy(&output.stdout);

    if output.code != 0 && stdout.trim().is_empty() {
        return Err(BridgeError::RunnerExitedNonZero {
            code: output.code,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    serde_json::from_slice::<Value>(&output.stdout).map_err(|_| BridgeError::InvalidJsonOutput {
        raw: stdout.into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

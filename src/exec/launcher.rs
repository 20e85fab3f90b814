// src/exec/launcher.rs

//! Spawning the runner script.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Child;
use tracing::info;

use crate::errors::{BridgeError, Result};
use crate::exec::interpreter::InterpreterCandidate;

/// What to run and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    /// Script handed to the interpreter as its last argument.
    pub script: PathBuf,
    /// Working directory of the child.
    pub workdir: PathBuf,
}

impl RunTarget {
    pub fn new(script: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            workdir: workdir.into(),
        }
    }

    /// A script resolved inside `dir`, which is also the working directory.
    pub fn in_dir(dir: &Path, script: &Path) -> Self {
        Self::new(dir.join(script), dir)
    }

    /// File name of the script, as shown in `"<name> not found"`.
    pub fn script_name(&self) -> String {
        self.script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.script.display().to_string())
    }
}

/// Fail with `RunnerMissing` unless the script is a regular file.
///
/// Runs before interpreter resolution, so a missing script never costs a
/// probe or a spawn.
pub async fn ensure_runner_exists(target: &RunTarget) -> Result<()> {
    match tokio::fs::metadata(&target.script).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(BridgeError::RunnerMissing {
            script: target.script_name(),
        }),
    }
}

/// Spawn `<interpreter> <script>` with all three standard streams piped.
///
/// The script path is made absolute first: the child starts in
/// `target.workdir`, where a relative path would no longer point at it.
/// The child is killed if its handle is dropped, so an abandoned request
/// cannot leave it running.
pub fn launch(interpreter: &InterpreterCandidate, target: &RunTarget) -> Result<Child> {
    let script = std::path::absolute(&target.script).map_err(BridgeError::SpawnFailed)?;
    launch_with_args(interpreter, &[script.into_os_string()], &target.workdir)
}

/// Spawn `<interpreter> <args..>` in `workdir`, piped and killed on drop.
pub fn launch_with_args(
    interpreter: &InterpreterCandidate,
    args: &[OsString],
    workdir: &Path,
) -> Result<Child> {
    let mut cmd = interpreter.command();
    cmd.args(args)
        .current_dir(workdir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(BridgeError::SpawnFailed)?;

    info!(
        pid = child.id().unwrap_or_default(),
        interpreter = %interpreter,
        args = ?args,
        workdir = %workdir.display(),
        "runner process started"
    );

    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_name_is_the_file_name() {
        let target = RunTarget::in_dir(Path::new("/srv/packs/demo"), Path::new("runner.py"));
        assert_eq!(target.script, PathBuf::from("/srv/packs/demo/runner.py"));
        assert_eq!(target.workdir, PathBuf::from("/srv/packs/demo"));
        assert_eq!(target.script_name(), "runner.py");
    }

    #[tokio::test]
    async fn missing_script_is_reported_by_name() {
        let dir = std::env::temp_dir().join("runner-bridge-launcher-missing");
        let target = RunTarget::in_dir(&dir, Path::new("nope.py"));

        match ensure_runner_exists(&target).await {
            Err(BridgeError::RunnerMissing { script }) => assert_eq!(script, "nope.py"),
            other => panic!("expected RunnerMissing, got {:?}", other),
        }
    }
}

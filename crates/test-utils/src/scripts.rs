use std::fs;
use std::path::{Path, PathBuf};

use runner_bridge::exec::RunTarget;
use tempfile::TempDir;

/// A throwaway bridge directory holding shell runner scripts.
///
/// Scripts are run as `sh <script>`, so they need no execute bit.
pub struct RunnerDir {
    dir: TempDir,
}

impl RunnerDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `body` to `rel` (parents created) and return the full path.
    pub fn write_script(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create script dir");
        }
        fs::write(&path, body).expect("write script");
        path
    }

    /// Write the default `runner.sh`.
    pub fn write_runner(&self, body: &str) -> PathBuf {
        self.write_script("runner.sh", body)
    }

    /// Target for `runner.sh` in this directory.
    pub fn target(&self) -> RunTarget {
        RunTarget::in_dir(self.dir.path(), Path::new("runner.sh"))
    }
}

impl Default for RunnerDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Echo stdin back unchanged.
pub const ECHO_RUNNER: &str = "cat\n";

/// Report the pid on stderr, then outlive any reasonable test timeout.
pub const SLEEPY_RUNNER: &str = "echo \"pid=$$\" >&2\nexec sleep 30\n";

/// Whether a process with this pid still exists.
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

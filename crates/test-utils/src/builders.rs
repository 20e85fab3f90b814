#![allow(dead_code)]

use std::path::PathBuf;

use runner_bridge::config::{ConfigFile, RawConfigFile};
use runner_bridge::exec::RunnerSettings;
use runner_bridge::types::DurationSpec;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults; [`ConfigFileBuilder::sh_runner`] swaps
/// the Python interpreters for `sh` so tests only need a POSIX shell.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    /// `sh runner.sh`, probed with `sh -c 'exit 0'`.
    pub fn sh_runner() -> Self {
        Self::new()
            .with_interpreters(&["sh"])
            .with_probe_args(&["-c", "exit 0"])
            .with_script("runner.sh")
    }

    pub fn with_interpreters(mut self, candidates: &[&str]) -> Self {
        self.config.runner.interpreters = candidates.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_probe_args(mut self, args: &[&str]) -> Self {
        self.config.runner.probe_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_script(mut self, script: &str) -> Self {
        self.config.runner.script = PathBuf::from(script);
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.config.runner.timeout = timeout.parse::<DurationSpec>().expect("valid duration");
        self
    }

    pub fn with_max_output_bytes(mut self, limit: usize) -> Self {
        self.config.runner.max_output_bytes = limit;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.config.bridge.max_body_bytes = limit;
        self
    }

    pub fn with_packs_root(mut self, root: &str) -> Self {
        self.config.packs.root = Some(PathBuf::from(root));
        self
    }

    pub fn with_install_args(mut self, args: &[&str]) -> Self {
        self.config.packs.install_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_install_timeout(mut self, timeout: &str) -> Self {
        self.config.packs.install_timeout =
            timeout.parse::<DurationSpec>().expect("valid duration");
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Validated config turned straight into backend settings.
    pub fn build_settings(self) -> RunnerSettings {
        let cfg = self.build();
        RunnerSettings::from_config(&cfg.runner).with_install(&cfg.packs)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

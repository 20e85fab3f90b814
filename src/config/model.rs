// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::DurationSpec;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [bridge]
/// listen = "127.0.0.1:8080"
/// base_dir = "."
///
/// [runner]
/// interpreters = ["python3", "python"]
/// script = "runner.py"
/// timeout = "120s"
///
/// [packs]
/// root = "custom-nodes"
/// install_timeout = "180s"
/// ```
///
/// All sections are optional and have reasonable defaults. This is the shape
/// straight out of `toml`; see [`ConfigFile`] for the validated version.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub packs: PacksSection,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on the invariants checked there.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub bridge: BridgeSection,
    pub runner: RunnerSection,
    pub packs: PacksSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        bridge: BridgeSection,
        runner: RunnerSection,
        packs: PacksSection,
    ) -> Self {
        Self {
            bridge,
            runner,
            packs,
        }
    }
}

/// `[bridge]` section: the HTTP side.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    /// `host:port` to bind.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// The bridge's own directory. Runner scripts resolve against it and the
    /// default runner runs with it as working directory.
    ///
    /// If `None`, the directory containing the config file is used.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            base_dir: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// `[runner]` section: how the child process is found, started and bounded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    /// Interpreter invocation strings, tried in order. `"py -3"` is split on
    /// whitespace into a program and its leading arguments.
    #[serde(default = "default_interpreters")]
    pub interpreters: Vec<String>,

    /// Arguments appended to a candidate for its version probe.
    #[serde(default = "default_probe_args")]
    pub probe_args: Vec<String>,

    /// Runner script, relative to the base directory (or pack directory).
    #[serde(default = "default_script")]
    pub script: PathBuf,

    /// Wall-clock budget for one runner invocation.
    #[serde(default = "default_timeout")]
    pub timeout: DurationSpec,

    /// Budget for a single interpreter probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: DurationSpec,

    /// Cap on stdout + stderr bytes captured from one runner.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_interpreters() -> Vec<String> {
    if cfg!(windows) {
        vec!["py -3".to_string(), "python".to_string(), "python3".to_string()]
    } else {
        vec!["python3".to_string(), "python".to_string()]
    }
}

fn default_probe_args() -> Vec<String> {
    vec!["-V".to_string()]
}

fn default_script() -> PathBuf {
    PathBuf::from("runner.py")
}

fn default_timeout() -> DurationSpec {
    DurationSpec::from_secs(120)
}

fn default_probe_timeout() -> DurationSpec {
    DurationSpec::from_secs(10)
}

fn default_max_output_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            interpreters: default_interpreters(),
            probe_args: default_probe_args(),
            script: default_script(),
            timeout: default_timeout(),
            probe_timeout: default_probe_timeout(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// `[packs]` section.
///
/// Each sub-directory of `root` is a pack with its own runner script, served
/// under `/packs/<slug>/run`. A pack with a `requirements.txt` can have its
/// dependencies installed through `/packs/<slug>/install`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacksSection {
    /// Packs directory, relative to the base directory. Packs are disabled
    /// when unset.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Arguments given to the resolved interpreter to install a pack's
    /// requirements. `{requirements}` is replaced by the absolute path of
    /// the pack's `requirements.txt`.
    #[serde(default = "default_install_args")]
    pub install_args: Vec<String>,

    /// Wall-clock budget for one install.
    #[serde(default = "default_install_timeout")]
    pub install_timeout: DurationSpec,
}

fn default_install_args() -> Vec<String> {
    ["-m", "pip", "install", "-r", "{requirements}"]
        .iter()
        .map(|a| a.to_string())
        .collect()
}

fn default_install_timeout() -> DurationSpec {
    DurationSpec::from_secs(180)
}

impl Default for PacksSection {
    fn default() -> Self {
        Self {
            root: None,
            install_args: default_install_args(),
            install_timeout: default_install_timeout(),
        }
    }
}

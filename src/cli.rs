// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::DurationSpec;

/// Command-line arguments for `runner-bridge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runner-bridge",
    version,
    about = "Relay JSON HTTP requests to a runner script over stdin/stdout.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `RunnerBridge.toml` in the current directory is used when
    /// present, otherwise built-in defaults apply.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Address to listen on, overriding `[bridge].listen`.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Runner timeout (e.g. "30s", "500ms"), overriding `[runner].timeout`.
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<DurationSpec>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNNER_BRIDGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config and resolve the interpreter, then exit without serving.
    #[arg(long)]
    pub check: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod server;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default, resolve_base_dir};
use crate::exec::{ProcessBackend, RunnerSettings, resolve_interpreter};
use crate::server::BridgeState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides
/// - the process backend
/// - the HTTP server (or the `--check` report)
pub async fn run(args: CliArgs) -> Result<()> {
    let explicit = args.config.as_deref().map(Path::new);
    let (mut cfg, config_path) = load_or_default(explicit)?;
    apply_overrides(&mut cfg, &args);

    let base_dir = resolve_base_dir(&config_path, &cfg)?;
    info!(
        config = %config_path.display(),
        base_dir = %base_dir.display(),
        "configuration loaded"
    );

    let backend =
        ProcessBackend::new(RunnerSettings::from_config(&cfg.runner).with_install(&cfg.packs));

    if args.check {
        return print_check(&cfg, &base_dir, &backend).await;
    }

    let listen = cfg.bridge.listen.clone();
    let state = Arc::new(BridgeState::from_config(&cfg, base_dir, Arc::new(backend)));
    server::serve(&listen, state).await
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(listen) = &args.listen {
        debug!(listen = %listen, "listen address overridden from CLI");
        cfg.bridge.listen = listen.clone();
    }
    if let Some(timeout) = args.timeout {
        if timeout.is_zero() {
            warn!("ignoring --timeout 0; keeping configured timeout");
        } else {
            debug!(timeout = %timeout, "runner timeout overridden from CLI");
            cfg.runner.timeout = timeout;
        }
    }
}

/// `--check` output: effective settings plus a live interpreter probe.
async fn print_check(cfg: &ConfigFile, base_dir: &Path, backend: &ProcessBackend) -> Result<()> {
    let script = base_dir.join(&cfg.runner.script);

    println!("runner-bridge check");
    println!("  bridge.listen = {}", cfg.bridge.listen);
    println!("  bridge.base_dir = {}", base_dir.display());
    println!("  bridge.max_body_bytes = {}", cfg.bridge.max_body_bytes);
    println!("  runner.script = {}", script.display());
    println!("  runner.timeout = {}", cfg.runner.timeout);
    println!("  runner.max_output_bytes = {}", cfg.runner.max_output_bytes);
    if let Some(root) = &cfg.packs.root {
        println!("  packs.root = {}", base_dir.join(root).display());
        println!("  packs.install_timeout = {}", cfg.packs.install_timeout);
    }
    println!();

    println!("interpreters ({}):", cfg.runner.interpreters.len());
    for candidate in &cfg.runner.interpreters {
        println!("  - {candidate}");
    }

    let settings = backend.settings();
    match resolve_interpreter(&settings.interpreters, &settings.probe).await {
        Ok(found) => println!("resolved interpreter: {found}"),
        Err(err) => println!("resolved interpreter: none ({err})"),
    }

    if !script.is_file() {
        println!("warning: runner script {} does not exist", script.display());
    }

    debug!("check complete (no server started)");
    Ok(())
}

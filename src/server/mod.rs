// src/server/mod.rs

//! HTTP surface of the bridge.
//!
//! - `POST /run` relays the body to the default runner script.
//! - `POST /packs/{slug}/run` relays it to a pack's runner script.
//! - `POST /packs/{slug}/install` installs a pack's `requirements.txt`.
//! - `GET /packs` lists packs, `GET /health` is a liveness check.
//!
//! Every response, error or not, is a JSON body.

pub mod packs;
pub mod routes;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigFile;
use crate::errors;
use crate::exec::{InstallTarget, RunTarget, RunnerBackend};

pub use packs::{
    MANIFEST_FILE, PackInfo, REQUIREMENTS_FILE, list_packs, resolve_pack_dir, sanitize_slug,
};
pub use routes::{build_router, json_response};

/// Shared, read-only state behind every route.
pub struct BridgeState {
    backend: Arc<dyn RunnerBackend>,
    base_dir: PathBuf,
    script: PathBuf,
    packs_root: Option<PathBuf>,
    max_body_bytes: usize,
}

impl BridgeState {
    pub fn new(
        backend: Arc<dyn RunnerBackend>,
        base_dir: PathBuf,
        script: PathBuf,
        packs_root: Option<PathBuf>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            backend,
            base_dir,
            script,
            packs_root,
            max_body_bytes,
        }
    }

    /// Build state from validated config. `base_dir` is the already
    /// resolved bridge directory; the packs root is taken relative to it.
    pub fn from_config(cfg: &ConfigFile, base_dir: PathBuf, backend: Arc<dyn RunnerBackend>) -> Self {
        let packs_root = cfg.packs.root.as_ref().map(|root| base_dir.join(root));
        Self::new(
            backend,
            base_dir,
            cfg.runner.script.clone(),
            packs_root,
            cfg.bridge.max_body_bytes,
        )
    }

    pub fn backend(&self) -> &dyn RunnerBackend {
        self.backend.as_ref()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn packs_root(&self) -> Option<&Path> {
        self.packs_root.as_deref()
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// The runner script in the bridge's own directory.
    pub fn default_target(&self) -> RunTarget {
        RunTarget::in_dir(&self.base_dir, &self.script)
    }

    /// The runner script of pack `slug`. Packs are unknown when no packs
    /// root is configured.
    pub async fn pack_target(&self, slug: &str) -> errors::Result<RunTarget> {
        let dir = self.pack_dir(slug).await?;
        Ok(RunTarget::in_dir(&dir, &self.script))
    }

    /// The requirements file of pack `slug`, which must exist.
    pub async fn install_target(&self, slug: &str) -> errors::Result<InstallTarget> {
        let pack_dir = self.pack_dir(slug).await?;
        let requirements = pack_dir.join(REQUIREMENTS_FILE);
        match tokio::fs::metadata(&requirements).await {
            Ok(meta) if meta.is_file() => Ok(InstallTarget {
                pack_dir,
                requirements,
            }),
            _ => Err(errors::BridgeError::RequirementsMissing),
        }
    }

    async fn pack_dir(&self, slug: &str) -> errors::Result<PathBuf> {
        let root = self
            .packs_root
            .as_deref()
            .ok_or_else(|| errors::BridgeError::PackNotFound(sanitize_slug(slug)))?;
        resolve_pack_dir(root, slug).await
    }
}

/// Bind `listen` and serve until Ctrl-C.
pub async fn serve(listen: &str, state: Arc<BridgeState>) -> Result<()> {
    let bind_addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address '{listen}': expected host:port"))?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind runner bridge on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve runner bridge listen address")?;

    info!(
        addr = %local_addr,
        base_dir = %state.base_dir().display(),
        script = %state.script().display(),
        "runner bridge listening"
    );

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("runner bridge server exited unexpectedly")?;

    info!("runner bridge stopped");
    Ok(())
}

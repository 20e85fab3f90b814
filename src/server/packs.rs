// src/server/packs.rs

//! Runner packs: sub-directories of the packs root, each with its own
//! runner script, a `manifest.json` describing its nodes and optionally a
//! `requirements.txt`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{BridgeError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

const DEFAULT_VERSION: &str = "0.0.0";

static SLUG_DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("slug pattern is valid"));

/// Strip every character outside `[A-Za-z0-9._-]`.
pub fn sanitize_slug(raw: &str) -> String {
    SLUG_DISALLOWED.replace_all(raw, "").into_owned()
}

/// Map a request slug to its pack directory under `root`.
///
/// - empty, `.` or `..` after sanitizing -> `InvalidPack`
/// - no such directory -> `PackNotFound`
/// - a directory that resolves outside `root` (symlink) -> `InvalidPack`
pub async fn resolve_pack_dir(root: &Path, raw_slug: &str) -> Result<PathBuf> {
    let slug = sanitize_slug(raw_slug);
    if slug.is_empty() || slug == "." || slug == ".." {
        return Err(BridgeError::InvalidPack(raw_slug.to_string()));
    }

    let candidate = root.join(&slug);
    match tokio::fs::metadata(&candidate).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(BridgeError::PackNotFound(slug)),
    }

    let root = tokio::fs::canonicalize(root).await?;
    let dir = tokio::fs::canonicalize(&candidate).await?;
    if !dir.starts_with(&root) {
        return Err(BridgeError::InvalidPack(slug));
    }

    Ok(dir)
}

/// One entry of `GET /packs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackInfo {
    pub slug: String,
    pub name: String,
    pub version: String,
    /// Runner script name when the pack has one.
    pub runner: Option<String>,
    pub has_requirements: bool,
    /// BLAKE3 hex digest of `requirements.txt`, so clients can tell when a
    /// reinstall is due.
    pub requirements_hash: Option<String>,
    pub nodes: Vec<Value>,
}

/// List the packs under `root` that carry a readable `manifest.json`,
/// sorted by slug.
///
/// A missing root lists nothing. Directories whose names would not survive
/// [`sanitize_slug`] are skipped since they could never be addressed.
pub async fn list_packs(root: &Path, script: &Path) -> Result<Vec<PackInfo>> {
    let mut packs = Vec::new();
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(root = %root.display(), "packs root does not exist");
            return Ok(packs);
        }
        Err(e) => return Err(e.into()),
    };
    let root = tokio::fs::canonicalize(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let slug = entry.file_name().to_string_lossy().into_owned();
        if sanitize_slug(&slug) != slug {
            continue;
        }
        match tokio::fs::canonicalize(entry.path()).await {
            Ok(dir) if dir.starts_with(&root) => {}
            _ => continue,
        }
        if let Some(info) = read_pack(&entry.path(), slug, script).await? {
            packs.push(info);
        }
    }

    packs.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(packs)
}

async fn read_pack(dir: &Path, slug: String, script: &Path) -> Result<Option<PackInfo>> {
    let Some(manifest) = read_manifest(&dir.join(MANIFEST_FILE)).await else {
        debug!(slug = %slug, "skipping pack without a usable manifest");
        return Ok(None);
    };

    let name = string_field(&manifest, "name").unwrap_or_else(|| slug.clone());
    let version = string_field(&manifest, "version").unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let script_name = script.to_string_lossy().into_owned();
    let node_runner = string_field(&manifest, "runner").unwrap_or_else(|| script_name.clone());

    let runner = is_file(&dir.join(script)).await.then_some(script_name);

    let requirements_path = dir.join(REQUIREMENTS_FILE);
    let has_requirements = is_file(&requirements_path).await;
    let requirements_hash = if has_requirements {
        tokio::fs::read(&requirements_path)
            .await
            .ok()
            .map(|bytes| blake3::hash(&bytes).to_hex().to_string())
    } else {
        None
    };

    let nodes = normalize_nodes(manifest.get("nodes"), &name, &slug, &node_runner);

    Ok(Some(PackInfo {
        slug,
        name,
        version,
        runner,
        has_requirements,
        requirements_hash,
        nodes,
    }))
}

/// The manifest if it exists and is a JSON object.
async fn read_manifest(path: &Path) -> Option<Map<String, Value>> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn string_field(manifest: &Map<String, Value>, key: &str) -> Option<String> {
    manifest.get(key).and_then(Value::as_str).map(str::to_string)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Fill in the node fields clients rely on and tag each node with its pack.
///
/// Non-object entries are dropped, as is a `nodes` value that is not a list.
fn normalize_nodes(nodes: Option<&Value>, pack: &str, slug: &str, runner: &str) -> Vec<Value> {
    let Some(Value::Array(nodes)) = nodes else {
        return Vec::new();
    };

    nodes
        .iter()
        .filter_map(Value::as_object)
        .map(|node| {
            let mut node = node.clone();
            let node_type = node
                .entry("type")
                .or_insert_with(|| Value::String(String::new()))
                .clone();
            node.entry("title").or_insert(node_type);
            node.insert("pack".to_string(), Value::from(pack));
            node.insert("slug".to_string(), Value::from(slug));
            node.insert("runner".to_string(), Value::from(runner));
            for key in ["inspector", "inputs", "outputs"] {
                node.entry(key).or_insert_with(|| Value::Array(Vec::new()));
            }
            Value::Object(node)
        })
        .collect()
}

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks listen address, interpreter list and runner limits.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the config the CLI asked for.
///
/// An explicit path must exist. Without one, [`default_config_path`] is used
/// if present and built-in defaults otherwise.
pub fn load_or_default(explicit: Option<&Path>) -> Result<(ConfigFile, PathBuf)> {
    if let Some(path) = explicit {
        return Ok((load_and_validate(path)?, path.to_path_buf()));
    }

    let path = default_config_path();
    if path.is_file() {
        return Ok((load_and_validate(&path)?, path));
    }

    debug!(path = %path.display(), "no config file found; using built-in defaults");
    Ok((ConfigFile::try_from(RawConfigFile::default())?, path))
}

/// Default config location: `RunnerBridge.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("RunnerBridge.toml")
}

/// Figure out the bridge's own directory, as an absolute path.
///
/// - An explicit `[bridge].base_dir` wins; a relative one is taken relative
///   to the config file's directory.
/// - Otherwise the config file's directory is used.
/// - If that is empty (a bare filename like "RunnerBridge.toml"), we fall
///   back to the current working directory.
///
/// Runners are started with the base directory as their working directory,
/// so a relative result would be resolved twice.
pub fn resolve_base_dir(config_path: &Path, cfg: &ConfigFile) -> Result<PathBuf> {
    let config_dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };

    let base = match &cfg.bridge.base_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => config_dir.join(dir),
        None => config_dir,
    };

    Ok(std::path::absolute(base)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_base_dir_is_anchored_at_config_dir() {
        let mut cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        cfg.bridge.base_dir = Some(PathBuf::from("bridge"));

        let base = resolve_base_dir(Path::new("/srv/app/RunnerBridge.toml"), &cfg).unwrap();
        assert_eq!(base, PathBuf::from("/srv/app/bridge"));
    }

    #[test]
    fn base_dir_defaults_to_config_dir() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        let base = resolve_base_dir(Path::new("/srv/app/RunnerBridge.toml"), &cfg).unwrap();
        assert_eq!(base, PathBuf::from("/srv/app"));
    }

    #[test]
    fn relative_config_path_yields_absolute_base_dir() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        let base = resolve_base_dir(Path::new("demos/RunnerBridge.toml"), &cfg).unwrap();

        assert!(base.is_absolute(), "{}", base.display());
        assert_eq!(base, std::env::current_dir().unwrap().join("demos"));

        let bare = resolve_base_dir(Path::new("RunnerBridge.toml"), &cfg).unwrap();
        assert_eq!(bare, std::env::current_dir().unwrap());
    }
}

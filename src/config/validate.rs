// src/config/validate.rs

use std::net::SocketAddr;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BridgeError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BridgeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.bridge, raw.runner, raw.packs))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_bridge(cfg)?;
    validate_interpreters(cfg)?;
    validate_runner_limits(cfg)?;
    validate_packs(cfg)?;
    Ok(())
}

fn validate_bridge(cfg: &RawConfigFile) -> Result<()> {
    if cfg.bridge.listen.parse::<SocketAddr>().is_err() {
        return Err(BridgeError::ConfigError(format!(
            "[bridge].listen must be host:port (got '{}')",
            cfg.bridge.listen
        )));
    }

    if cfg.bridge.max_body_bytes == 0 {
        return Err(BridgeError::ConfigError(
            "[bridge].max_body_bytes must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_interpreters(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.interpreters.is_empty() {
        return Err(BridgeError::ConfigError(
            "[runner].interpreters must list at least one candidate".to_string(),
        ));
    }

    for (idx, candidate) in cfg.runner.interpreters.iter().enumerate() {
        if candidate.trim().is_empty() {
            return Err(BridgeError::ConfigError(format!(
                "[runner].interpreters[{}] is blank",
                idx
            )));
        }
    }

    Ok(())
}

fn validate_runner_limits(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.script.as_os_str().is_empty() {
        return Err(BridgeError::ConfigError(
            "[runner].script must not be empty".to_string(),
        ));
    }

    if cfg.runner.timeout.is_zero() {
        return Err(BridgeError::ConfigError(
            "[runner].timeout must be greater than zero".to_string(),
        ));
    }

    if cfg.runner.probe_timeout.is_zero() {
        return Err(BridgeError::ConfigError(
            "[runner].probe_timeout must be greater than zero".to_string(),
        ));
    }

    if cfg.runner.max_output_bytes == 0 {
        return Err(BridgeError::ConfigError(
            "[runner].max_output_bytes must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_packs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.packs.install_args.is_empty() {
        return Err(BridgeError::ConfigError(
            "[packs].install_args must not be empty".to_string(),
        ));
    }

    if cfg.packs.install_timeout.is_zero() {
        return Err(BridgeError::ConfigError(
            "[packs].install_timeout must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

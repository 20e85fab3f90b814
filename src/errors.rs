// src/errors.rs

//! Crate-wide error type and its HTTP mapping.
//!
//! Every request-level failure is terminal for that request: nothing is
//! retried. Each variant maps to exactly one status code and one JSON body,
//! so callers always get JSON back regardless of what went wrong.

use axum::http::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("No Python interpreter found on server")]
    NoInterpreterFound,

    #[error("{script} not found")]
    RunnerMissing { script: String },

    #[error("Failed to start runner: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("runner timeout")]
    Timeout { stderr: String },

    #[error("runner exited with error (code {code})")]
    RunnerExitedNonZero { code: i32, stderr: String },

    #[error("invalid JSON from runner")]
    InvalidJsonOutput { raw: String, stderr: String },

    #[error("runner output exceeded limit of {limit} bytes")]
    OutputTooLarge { limit: usize },

    #[error("pack not found: {0}")]
    PackNotFound(String),

    #[error("Invalid pack: {0}")]
    InvalidPack(String),

    #[error("No requirements.txt")]
    RequirementsMissing,

    #[error("{0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    /// HTTP status used when this error terminates a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::PackNotFound(_) | BridgeError::RequirementsMissing => {
                StatusCode::NOT_FOUND
            }
            BridgeError::InvalidPack(_) | BridgeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for this error. `error` is always present; the runner
    /// variants add `code`, `stderr` or `raw` diagnostics.
    pub fn payload(&self) -> Value {
        match self {
            BridgeError::NoInterpreterFound
            | BridgeError::RunnerMissing { .. }
            | BridgeError::RequirementsMissing => {
                json!({ "error": self.to_string() })
            }
            BridgeError::SpawnFailed(_) => json!({ "error": "Failed to start runner" }),
            BridgeError::Timeout { stderr } => json!({
                "error": "runner timeout",
                "stderr": stderr,
            }),
            BridgeError::RunnerExitedNonZero { code, stderr } => json!({
                "error": "runner exited with error",
                "code": code,
                "stderr": stderr,
            }),
            BridgeError::InvalidJsonOutput { raw, stderr } => json!({
                "error": "invalid JSON from runner",
                "raw": raw,
                "stderr": stderr,
            }),
            BridgeError::OutputTooLarge { limit } => json!({
                "error": "runner output exceeded limit",
                "limit": limit,
            }),
            BridgeError::PackNotFound(_) => json!({ "error": "pack not found" }),
            BridgeError::InvalidPack(_) => json!({ "error": "Invalid pack" }),
            BridgeError::BadRequest(msg) => json!({ "error": msg }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_gateway_timeout_with_stderr() {
        let err = BridgeError::Timeout {
            stderr: "still loading".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            err.payload(),
            json!({ "error": "runner timeout", "stderr": "still loading" })
        );
    }

    #[test]
    fn runner_missing_names_the_script() {
        let err = BridgeError::RunnerMissing {
            script: "runner.py".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.payload(), json!({ "error": "runner.py not found" }));
    }

    #[test]
    fn spawn_failure_hides_os_detail_from_body() {
        let err = BridgeError::SpawnFailed(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.payload(), json!({ "error": "Failed to start runner" }));
        assert!(err.to_string().starts_with("Failed to start runner"));
    }
}

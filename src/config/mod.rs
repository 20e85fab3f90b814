// src/config/mod.rs

//! Configuration loading and validation for runner-bridge.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like a usable interpreter list (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default, resolve_base_dir};
pub use model::{BridgeSection, ConfigFile, PacksSection, RawConfigFile, RunnerSection};

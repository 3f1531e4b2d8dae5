// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    Binaries, BundleSettings, ConfigFile, DEFAULT_BINARY, DEFAULT_TARGET, RawConfigFile,
    RunnerConfig, Settings,
};
pub use validate::validate_config;

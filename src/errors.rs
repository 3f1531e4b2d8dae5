// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Invariant violations (`QueueInvariant`, `AlreadyKilled`, `TempDirAlreadySet`,
//! `ProcessAlreadySet`, `ConfigError`) are caller/programmer errors and are
//! never retried. Failures of individual queued tasks travel as `Other`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue invariant violated: {0}")]
    QueueInvariant(String),

    #[error("Cannot kill twice")]
    AlreadyKilled,

    #[error("Invalid tmp state: temporary directory already exists for this session")]
    TempDirAlreadySet,

    #[error("Invalid process state: a runner process already exists for this session")]
    ProcessAlreadySet,

    #[error("Task was dropped before reporting an outcome")]
    TaskDropped,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SupervisorError>;

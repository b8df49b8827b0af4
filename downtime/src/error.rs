//! Error types for the lineage runner, store and CLI.

use downtime_freshness::EvalError;
use downtime_synth::SynthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DowntimeError {
    #[error("Generator error: {0}")]
    Synth(#[from] SynthError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored row could not be mapped back to a record
    #[error("Malformed row: {0}")]
    Row(String),

    #[error("Unknown generation: {0}")]
    MissingGeneration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DowntimeError>;

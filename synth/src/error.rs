//! Error types for the generator.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised before or during a generation run.
///
/// Generation itself has no recoverable failure modes; every variant here is
/// an input-contract violation reported before any record is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A schema version dropped columns that an earlier version had
    #[error("Schema version {version} drops columns present earlier: {}", missing.join(", "))]
    NonMonotonicSchema { version: u32, missing: Vec<String> },

    /// Day cursor ran past the representable calendar
    #[error("Date overflow after {0}")]
    DateOverflow(NaiveDate),

    /// Column name that is not a nullable field
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Atmosphere symbol outside the fixed alphabet
    #[error("Unknown atmosphere: {0}")]
    UnknownAtmosphere(String),

    /// Column list could not be rendered as JSON
    #[error("Schema description failed: {0}")]
    Describe(String),
}

pub type Result<T> = std::result::Result<T, SynthError>;

//! downtime: builds a synthetic exoplanet dataset lineage with injected
//! outages and null spikes, and scores a freshness-gap detector against the
//! known outage dates.
//!
//! - [`lineage`] runs the configured generations into SQLite files
//! - [`store`] is the relational store the tables are written to
//! - [`report`] sweeps detector thresholds over a stored table

pub mod config;
pub mod error;
pub mod lineage;
pub mod report;
pub mod store;
pub mod tables;

pub use config::{AnomalyConfig, Config, DeriveMode, EvaluationConfig, GenerationConfig, GenerationMode};
pub use error::{DowntimeError, Result};
pub use lineage::{generation_rng, GenerationSummary, LineageRunner};
pub use store::{RelationalStore, SqliteStore, Table, Value, WriteMode};

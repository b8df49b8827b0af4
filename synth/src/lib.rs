//! Synthetic exoplanet dataset generator for data-downtime exercises.
//!
//! Produces day-by-day record batches with two kinds of injected incidents:
//!
//! - **Full outages**: runs of consecutive days that emit no rows at all
//! - **Null spikes**: runs of days where a random subset of fields is forced
//!   null at an elevated rate
//!
//! plus a derived habitability table computed per record with its own
//! randomized clamping and duplication noise.
//!
//! All randomness is drawn from one caller-supplied stream in a fixed order,
//! so a seed reproduces a run record for record.

pub mod config;
pub mod derive;
pub mod draw;
pub mod error;
pub mod generator;
pub mod schema;
pub mod state;
pub mod types;

pub use config::{CountRange, DayOverride, GeneratorConfig, OutageLength, PresenceTable};
pub use derive::{DeriveConfig, Deriver};
pub use error::{Result, SynthError};
pub use generator::{DayReport, GenerationOutput, Generator};
pub use schema::{
    Column, ColumnType, Lineage, Schema, SchemaHistoryEntry, SchemaVersion, DATE_COLUMN,
    ID_COLUMN,
};
pub use state::{GeneratorState, NullSpike, OutageTimer};
pub use types::{Atmosphere, DerivedRecord, EntityRecord, Field, FieldValue};

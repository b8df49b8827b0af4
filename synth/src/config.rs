//! Generator configuration.
//!
//! Every probability and range is tunable so that each observed generation
//! variant can be reproduced from one implementation.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SynthError};
use crate::schema::Schema;
use crate::types::Field;

/// Inclusive integer range drawn uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

impl CountRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &str, floor: u32) -> Result<()> {
        if self.min < floor || self.min > self.max {
            return Err(SynthError::InvalidConfig(format!(
                "{} range must satisfy {} <= min <= max, got {}..={}",
                name, floor, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Distribution of a freshly triggered outage's length in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutageLength {
    /// Uniform integer in `min..=max`.
    Uniform { min: u32, max: u32 },
    /// `|trunc(N(mean, std_dev))|`. Can be zero, which ends an outage in
    /// progress without starting a new one.
    FoldedGaussian { mean: f64, std_dev: f64 },
}

impl Default for OutageLength {
    fn default() -> Self {
        OutageLength::Uniform { min: 1, max: 7 }
    }
}

/// Per-field probability that a value is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceTable(BTreeMap<Field, f64>);

impl PresenceTable {
    pub fn new(entries: impl IntoIterator<Item = (Field, f64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn probability(&self, field: Field) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn set(&mut self, field: Field, probability: f64) {
        self.0.insert(field, probability);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PresenceTable {
    fn default() -> Self {
        Self::new(Field::ALL.iter().map(|f| (*f, f.default_presence())))
    }
}

/// Replaces trigger probabilities on a single calendar day.
///
/// The trigger draw is still taken from the stream, so overriding a day does
/// not shift the draws of any later day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOverride {
    pub date: NaiveDate,
    #[serde(default)]
    pub outage_probability: Option<f64>,
    #[serde(default)]
    pub null_spike_probability: Option<f64>,
}

/// Configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// First simulated day
    pub start_date: NaiveDate,
    /// Number of simulated days, including outage days
    pub num_days: u32,
    /// Daily probability of starting an outage
    #[serde(default = "default_trigger_probability")]
    pub outage_probability: f64,
    /// Daily probability of starting a null spike
    #[serde(default = "default_trigger_probability")]
    pub null_spike_probability: f64,
    /// Probability that a spiked field is forced null
    #[serde(default = "default_spike_severity")]
    pub null_spike_severity: f64,
    #[serde(default)]
    pub outage_length: OutageLength,
    #[serde(default = "default_spike_length")]
    pub spike_length: CountRange,
    #[serde(default = "default_batch_size")]
    pub batch_size: CountRange,
    #[serde(default)]
    pub presence: PresenceTable,
    /// Fields a null spike may pick from. Empty means every schema field.
    #[serde(default)]
    pub spike_fields: Vec<Field>,
    #[serde(default)]
    pub overrides: Vec<DayOverride>,
}

/// Daily trigger probability for outages and null spikes.
pub fn default_trigger_probability() -> f64 {
    0.03
}
pub fn default_spike_severity() -> f64 {
    0.95
}
pub fn default_spike_length() -> CountRange {
    CountRange::new(1, 7)
}
/// Records emitted per non-outage day.
pub fn default_batch_size() -> CountRange {
    CountRange::new(80, 120)
}

impl GeneratorConfig {
    /// Create a config with the observed default probabilities.
    pub fn new(start_date: NaiveDate, num_days: u32) -> Self {
        Self {
            start_date,
            num_days,
            outage_probability: default_trigger_probability(),
            null_spike_probability: default_trigger_probability(),
            null_spike_severity: default_spike_severity(),
            outage_length: OutageLength::default(),
            spike_length: default_spike_length(),
            batch_size: default_batch_size(),
            presence: PresenceTable::default(),
            spike_fields: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn with_outage_probability(mut self, probability: f64) -> Self {
        self.outage_probability = probability;
        self
    }

    pub fn with_null_spike_probability(mut self, probability: f64) -> Self {
        self.null_spike_probability = probability;
        self
    }

    pub fn with_null_spike_severity(mut self, severity: f64) -> Self {
        self.null_spike_severity = severity;
        self
    }

    pub fn with_outage_length(mut self, length: OutageLength) -> Self {
        self.outage_length = length;
        self
    }

    pub fn with_spike_fields(mut self, fields: Vec<Field>) -> Self {
        self.spike_fields = fields;
        self
    }

    pub fn with_override(mut self, day: DayOverride) -> Self {
        self.overrides.push(day);
        self
    }

    /// Outage probability in effect on `date`.
    pub fn outage_probability_on(&self, date: NaiveDate) -> f64 {
        self.overrides
            .iter()
            .rev()
            .find(|o| o.date == date)
            .and_then(|o| o.outage_probability)
            .unwrap_or(self.outage_probability)
    }

    /// Null-spike probability in effect on `date`.
    pub fn null_spike_probability_on(&self, date: NaiveDate) -> f64 {
        self.overrides
            .iter()
            .rev()
            .find(|o| o.date == date)
            .and_then(|o| o.null_spike_probability)
            .unwrap_or(self.null_spike_probability)
    }

    /// Fields a null spike may pick from, in schema order.
    pub fn spike_candidates(&self, schema: &Schema) -> Vec<Field> {
        if self.spike_fields.is_empty() {
            schema.fields().to_vec()
        } else {
            schema
                .fields()
                .iter()
                .copied()
                .filter(|f| self.spike_fields.contains(f))
                .collect()
        }
    }

    /// Last simulated day, if it is representable.
    pub fn end_date(&self) -> Option<NaiveDate> {
        let span = i64::from(self.num_days.checked_sub(1)?);
        self.start_date.checked_add_signed(Duration::days(span))
    }

    /// Reject configurations that cannot produce a well-formed run.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        if self.num_days == 0 {
            return Err(SynthError::InvalidConfig(
                "num_days must be at least 1".to_string(),
            ));
        }
        // The day after the last one is computed too.
        if self.end_date().and_then(|end| end.succ_opt()).is_none() {
            return Err(SynthError::DateOverflow(self.start_date));
        }

        check_probability("outage_probability", self.outage_probability)?;
        check_probability("null_spike_probability", self.null_spike_probability)?;
        check_probability("null_spike_severity", self.null_spike_severity)?;
        for day in &self.overrides {
            if let Some(p) = day.outage_probability {
                check_probability(&format!("outage_probability on {}", day.date), p)?;
            }
            if let Some(p) = day.null_spike_probability {
                check_probability(&format!("null_spike_probability on {}", day.date), p)?;
            }
        }

        match self.outage_length {
            OutageLength::Uniform { min, max } => {
                CountRange::new(min, max).validate("outage_length", 1)?
            }
            OutageLength::FoldedGaussian { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(SynthError::InvalidConfig(format!(
                        "folded gaussian outage length needs finite mean and std_dev >= 0, got ({}, {})",
                        mean, std_dev
                    )));
                }
            }
        }
        self.spike_length.validate("spike_length", 1)?;
        self.batch_size.validate("batch_size", 0)?;

        if self.presence.is_empty() {
            return Err(SynthError::InvalidConfig(
                "presence table is empty".to_string(),
            ));
        }
        for field in schema.fields() {
            let p = self.presence.probability(*field).ok_or_else(|| {
                SynthError::InvalidConfig(format!("no presence probability for {}", field))
            })?;
            check_probability(&format!("presence of {}", field), p)?;
        }

        if let Some(stray) = self.spike_fields.iter().find(|f| !schema.contains(**f)) {
            return Err(SynthError::InvalidConfig(format!(
                "spike field {} is not part of the schema",
                stray
            )));
        }

        Ok(())
    }
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(SynthError::InvalidConfig(format!(
            "{} must be within [0, 1], got {}",
            name, p
        )))
    }
}

//! Lineage configuration
//!
//! Loaded from TOML. The built-in defaults reproduce the four observed
//! dataset generations.

use chrono::NaiveDate;
use downtime_freshness::{default_thresholds, GroundTruth};
use downtime_synth::config::{
    default_batch_size, default_spike_length, default_spike_severity,
    default_trigger_probability,
};
use downtime_synth::{
    CountRange, DayOverride, DeriveConfig, Field, GeneratorConfig, OutageLength, PresenceTable,
    Schema,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{DowntimeError, Result};
use crate::tables::ENTITY_TABLE;

/// Default seed phrase.
pub const DEFAULT_SEED: &str = "data downtime";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seed phrase, hashed into every generation's random stream
    #[serde(default = "default_seed")]
    pub seed: String,

    /// Directory holding one SQLite file per generation
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_generations")]
    pub generations: Vec<GenerationConfig>,

    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

fn default_seed() -> String {
    DEFAULT_SEED.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_generations() -> Vec<GenerationConfig> {
    let base_spikes = Field::BASE.to_vec();
    vec![
        GenerationConfig {
            name: "ex1".to_string(),
            mode: GenerationMode::Fresh,
            start_date: ymd(2020, 1, 1),
            num_days: 200,
            fields: Schema::base(),
            spike_fields: base_spikes.clone(),
            derive: DeriveMode::None,
            derivation: DeriveConfig::default(),
            anomalies: AnomalyConfig::default(),
        },
        GenerationConfig {
            name: "ex2".to_string(),
            mode: GenerationMode::Extend,
            start_date: ymd(2020, 7, 19),
            num_days: 50,
            fields: Schema::full(),
            spike_fields: base_spikes.clone(),
            derive: DeriveMode::None,
            derivation: DeriveConfig::default(),
            anomalies: AnomalyConfig::default(),
        },
        GenerationConfig {
            name: "ex3".to_string(),
            mode: GenerationMode::Extend,
            start_date: ymd(2020, 9, 7),
            num_days: 100,
            fields: Schema::full(),
            spike_fields: base_spikes,
            derive: DeriveMode::ReplayAndInline,
            derivation: DeriveConfig::default(),
            anomalies: AnomalyConfig::default(),
        },
        GenerationConfig {
            name: "ex4".to_string(),
            mode: GenerationMode::Fresh,
            start_date: ymd(2020, 1, 1),
            num_days: 500,
            fields: Schema::full(),
            spike_fields: Vec::new(),
            derive: DeriveMode::Inline,
            derivation: DeriveConfig::default(),
            anomalies: AnomalyConfig {
                outage_length: OutageLength::FoldedGaussian {
                    mean: 1.0,
                    std_dev: 8.0,
                },
                ..AnomalyConfig::default()
            },
        },
    ]
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            output_dir: default_output_dir(),
            generations: default_generations(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Independent snapshot with no carried rows
    Fresh,
    /// Carry every row of the previous generation, then append new days
    Extend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeriveMode {
    /// No derived table (carried derived rows are kept as-is)
    #[default]
    None,
    /// Derive rows for newly generated records only
    Inline,
    /// Re-derive every carried record, then derive new records inline
    ReplayAndInline,
}

/// One dataset snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Store file stem, unique across the lineage
    pub name: String,
    pub mode: GenerationMode,
    pub start_date: NaiveDate,
    pub num_days: u32,
    /// Nullable fields of this snapshot's primary table
    pub fields: Schema,
    /// Fields a null spike may pick from. Empty means every field.
    #[serde(default)]
    pub spike_fields: Vec<Field>,
    #[serde(default)]
    pub derive: DeriveMode,
    #[serde(default)]
    pub derivation: DeriveConfig,
    #[serde(default)]
    pub anomalies: AnomalyConfig,
}

impl GenerationConfig {
    /// Last simulated day. Fails when the day count runs past the calendar.
    pub fn end_date(&self) -> Result<NaiveDate> {
        self.generator_config().end_date().ok_or_else(|| {
            DowntimeError::Config(format!(
                "generation {} cannot run {} days from {}",
                self.name, self.num_days, self.start_date
            ))
        })
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        let a = &self.anomalies;
        GeneratorConfig {
            start_date: self.start_date,
            num_days: self.num_days,
            outage_probability: a.outage_probability,
            null_spike_probability: a.null_spike_probability,
            null_spike_severity: a.null_spike_severity,
            outage_length: a.outage_length,
            spike_length: a.spike_length,
            batch_size: a.batch_size,
            presence: a.presence.clone(),
            spike_fields: self.spike_fields.clone(),
            overrides: a.overrides.clone(),
        }
    }
}

/// Incident injection knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_trigger_probability")]
    pub outage_probability: f64,
    #[serde(default = "default_trigger_probability")]
    pub null_spike_probability: f64,
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
    #[serde(default)]
    pub overrides: Vec<DayOverride>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            outage_probability: default_trigger_probability(),
            null_spike_probability: default_trigger_probability(),
            null_spike_severity: default_spike_severity(),
            outage_length: OutageLength::default(),
            spike_length: default_spike_length(),
            batch_size: default_batch_size(),
            presence: PresenceTable::default(),
            overrides: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Table whose `date_added` history is scored
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u32>,
    #[serde(default = "default_ground_truth")]
    pub ground_truth: Vec<NaiveDate>,
}

fn default_table() -> String {
    ENTITY_TABLE.to_string()
}

fn default_ground_truth() -> Vec<NaiveDate> {
    GroundTruth::reference().dates().iter().copied().collect()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            thresholds: default_thresholds(),
            ground_truth: default_ground_truth(),
        }
    }
}

impl EvaluationConfig {
    pub fn ground_truth(&self) -> Result<GroundTruth> {
        Ok(GroundTruth::new(self.ground_truth.iter().copied())?)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load `path` if it exists, else the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            info!("Loaded config from {}", path.display());
            Self::from_toml_str(&content)
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn generation(&self, name: &str) -> Result<&GenerationConfig> {
        self.generations
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| DowntimeError::MissingGeneration(name.to_string()))
    }

    /// Generation preceding `name` in lineage order.
    pub fn predecessor(&self, name: &str) -> Result<Option<&GenerationConfig>> {
        let index = self
            .generations
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| DowntimeError::MissingGeneration(name.to_string()))?;
        Ok(index.checked_sub(1).map(|i| &self.generations[i]))
    }

    /// Reject anything that would fail part-way through a run.
    pub fn validate(&self) -> Result<()> {
        if self.seed.is_empty() {
            return Err(DowntimeError::Config("seed phrase is empty".to_string()));
        }
        if self.generations.is_empty() {
            return Err(DowntimeError::Config("no generations configured".to_string()));
        }

        let mut names = HashSet::new();
        let mut previous: Option<&GenerationConfig> = None;
        for (index, generation) in self.generations.iter().enumerate() {
            let name = &generation.name;
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(DowntimeError::Config(format!(
                    "generation name {:?} is not a valid file stem",
                    name
                )));
            }
            if !names.insert(name.as_str()) {
                return Err(DowntimeError::Config(format!(
                    "generation name {} is used twice",
                    name
                )));
            }

            let end_date = generation.end_date()?;
            generation
                .generator_config()
                .validate(&generation.fields)?;
            downtime_synth::Deriver::new(generation.derivation.clone())?;

            match (generation.mode, previous) {
                (GenerationMode::Extend, None) => {
                    return Err(DowntimeError::Config(format!(
                        "generation {} extends nothing; the first generation must be fresh",
                        name
                    )));
                }
                (GenerationMode::Extend, Some(prev)) => {
                    let expected = prev
                        .end_date()?
                        .succ_opt()
                        .ok_or_else(|| DowntimeError::Config(format!(
                            "generation {} ends on the last representable day",
                            prev.name
                        )))?;
                    if generation.start_date != expected {
                        return Err(DowntimeError::Config(format!(
                            "generation {} must start on {}, the day after {} ends, not {}",
                            name, expected, prev.name, generation.start_date
                        )));
                    }
                }
                (GenerationMode::Fresh, _) => {
                    if generation.derive == DeriveMode::ReplayAndInline {
                        return Err(DowntimeError::Config(format!(
                            "generation {} is fresh and has no rows to replay",
                            name
                        )));
                    }
                }
            }

            if let Some(prev) = previous {
                let missing = generation.fields.missing_from(&prev.fields);
                if !missing.is_empty() {
                    return Err(downtime_synth::SynthError::NonMonotonicSchema {
                        version: index as u32 + 1,
                        missing: missing.iter().map(|f| f.column().to_string()).collect(),
                    }
                    .into());
                }
            }
            if generation.anomalies.overrides.iter().any(|o| {
                o.date < generation.start_date || o.date > end_date
            }) {
                warn!(generation = %name, "Day override falls outside the simulated days");
            }

            previous = Some(generation);
        }

        if self.evaluation.thresholds.is_empty() {
            return Err(downtime_freshness::EvalError::EmptyThresholds.into());
        }
        self.evaluation.ground_truth()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_four_generations() {
        let config = Config::default();
        config.validate().unwrap();
        let names: Vec<&str> = config.generations.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["ex1", "ex2", "ex3", "ex4"]);
        assert_eq!(config.generations[0].end_date().unwrap(), ymd(2020, 7, 18));
        assert_eq!(config.generations[1].end_date().unwrap(), ymd(2020, 9, 6));
        assert_eq!(config.evaluation.thresholds.len(), 15);
        assert_eq!(config.evaluation.ground_truth.len(), 9);
    }

    #[test]
    fn test_anomaly_defaults_match_generator_defaults() {
        let generation = &Config::default().generations[0];
        let from_anomalies = GenerationConfig {
            anomalies: AnomalyConfig::default(),
            ..generation.clone()
        }
        .generator_config();
        let expected = GeneratorConfig::new(generation.start_date, generation.num_days)
            .with_spike_fields(generation.spike_fields.clone());
        assert_eq!(from_anomalies, expected);
    }

    #[test]
    fn test_extend_must_follow_previous_generation() {
        let mut config = Config::default();
        config.generations[1].start_date = ymd(2020, 7, 20);
        assert!(matches!(config.validate(), Err(DowntimeError::Config(_))));
    }

    #[test]
    fn test_day_count_past_calendar_rejected() {
        let mut config = Config::default();
        config.generations[0].num_days = 4_000_000_000;
        assert!(config.generations[0].end_date().is_err());
        assert!(matches!(config.validate(), Err(DowntimeError::Config(_))));

        // Same through the TOML path
        let text = r#"
[[generations]]
name = "long"
mode = "fresh"
start_date = "2020-01-01"
num_days = 4000000000
fields = ["distance"]
"#;
        let parsed = Config::from_toml_str(text).unwrap();
        assert!(matches!(parsed.validate(), Err(DowntimeError::Config(_))));
    }

    #[test]
    fn test_dropped_column_rejected() {
        let mut config = Config::default();
        config.generations[2].fields = Schema::base();
        config.generations[2].spike_fields = Vec::new();
        assert!(matches!(
            config.validate(),
            Err(DowntimeError::Synth(
                downtime_synth::SynthError::NonMonotonicSchema { .. }
            ))
        ));
    }

    #[test]
    fn test_first_generation_cannot_extend() {
        let mut config = Config::default();
        config.generations.remove(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = Config::default();
        config.generations[3].name = "ex1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_evaluation_inputs_rejected() {
        let mut config = Config::default();
        config.evaluation.thresholds.clear();
        assert!(matches!(config.validate(), Err(DowntimeError::Eval(_))));

        let mut config = Config::default();
        config.evaluation.ground_truth.clear();
        assert!(matches!(config.validate(), Err(DowntimeError::Eval(_))));
    }

    #[test]
    fn test_lookup_and_predecessor() {
        let config = Config::default();
        assert_eq!(config.predecessor("ex3").unwrap().unwrap().name, "ex2");
        assert!(config.predecessor("ex1").unwrap().is_none());
        assert!(matches!(
            config.generation("ex9"),
            Err(DowntimeError::MissingGeneration(_))
        ));
    }
}

//! Lineage runner
//!
//! Builds each configured generation into its own SQLite file. An extending
//! generation reads its predecessor's tables back from disk, carries every
//! row forward under the wider schema, and appends the newly generated days.
//!
//! Every generation draws from its own stream, seeded by the phrase and the
//! generation name, so any single generation can be rebuilt without
//! rerunning the others and siblings never repeat each other's record ids.

use downtime_synth::{
    DerivedRecord, Deriver, EntityRecord, GenerationOutput, Generator, Lineage,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{Config, DeriveMode, GenerationConfig, GenerationMode};
use crate::error::{DowntimeError, Result};
use crate::store::{RelationalStore, SqliteStore, WriteMode};
use crate::tables::{
    derived_from_table, derived_table, entities_from_table, entity_table,
    schema_history_table, DERIVED_TABLE, ENTITY_TABLE, SCHEMA_TABLE,
};

/// Random stream for one generation: SHA-256 of the phrase, a NUL separator
/// and the generation name.
pub fn generation_rng(phrase: &str, generation: &str) -> StdRng {
    let mut hasher = Sha256::new();
    hasher.update(phrase.as_bytes());
    hasher.update([0u8]);
    hasher.update(generation.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    StdRng::from_seed(seed)
}

/// What a generation run wrote.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub name: String,
    pub db_path: PathBuf,
    pub schema_version: u32,
    pub carried_rows: usize,
    pub new_rows: usize,
    pub derived_rows: usize,
    pub distinct_dates: usize,
    pub outage_days: usize,
    pub spike_days: usize,
}

/// Rows carried from the predecessor store.
#[derive(Default)]
struct Carried {
    entities: Vec<EntityRecord>,
    derived: Option<Vec<DerivedRecord>>,
}

pub struct LineageRunner {
    config: Config,
}

impl LineageRunner {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store file of a generation.
    pub fn db_path(&self, name: &str) -> PathBuf {
        self.config.output_dir.join(format!("{}.db", name))
    }

    pub fn open_store(&self, name: &str) -> Result<SqliteStore> {
        self.config.generation(name)?;
        SqliteStore::open(&self.db_path(name))
    }

    /// Schema versions in effect for a generation, replayed from the config.
    pub fn lineage_for(&self, name: &str) -> Result<Lineage> {
        let mut lineage: Option<Lineage> = None;
        for generation in &self.config.generations {
            let schema = generation.fields.clone();
            lineage = Some(match (lineage, generation.mode) {
                (None, _) => Lineage::new(schema, generation.start_date),
                (Some(prev), GenerationMode::Fresh) => {
                    prev.regenerate(schema, generation.start_date)?
                }
                (Some(mut prev), GenerationMode::Extend) => {
                    if prev.current().schema != schema {
                        prev.evolve(schema, generation.start_date)?;
                    }
                    prev
                }
            });
            if generation.name == name {
                break;
            }
        }
        match lineage {
            Some(lineage) if self.config.generation(name).is_ok() => Ok(lineage),
            _ => Err(DowntimeError::MissingGeneration(name.to_string())),
        }
    }

    /// Build every generation in lineage order.
    pub fn run_all(&self) -> Result<Vec<GenerationSummary>> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        self.config
            .generations
            .iter()
            .map(|g| self.build(g))
            .collect()
    }

    /// Build one generation. An extending generation needs its predecessor's
    /// store on disk.
    pub fn run_one(&self, name: &str) -> Result<GenerationSummary> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let generation = self.config.generation(name)?;
        self.build(generation)
    }

    fn carried_rows(&self, generation: &GenerationConfig) -> Result<Carried> {
        if generation.mode == GenerationMode::Fresh {
            return Ok(Carried::default());
        }
        let prev = self.config.predecessor(&generation.name)?.ok_or_else(|| {
            DowntimeError::Config(format!("generation {} has no predecessor", generation.name))
        })?;
        let path = self.db_path(&prev.name);
        if !path.exists() {
            return Err(DowntimeError::Config(format!(
                "store {} not found; build generation {} first",
                path.display(),
                prev.name
            )));
        }

        let store = SqliteStore::open(&path)?;
        let (schema, entities) = entities_from_table(&store.read_table(ENTITY_TABLE)?)?;
        let missing = generation.fields.missing_from(&schema);
        if !missing.is_empty() {
            return Err(downtime_synth::SynthError::NonMonotonicSchema {
                version: self.lineage_for(&generation.name)?.current().version,
                missing: missing.iter().map(|f| f.column().to_string()).collect(),
            }
            .into());
        }
        let derived = if store.table_exists(DERIVED_TABLE)? {
            Some(derived_from_table(&store.read_table(DERIVED_TABLE)?)?)
        } else {
            None
        };
        info!(
            generation = %generation.name,
            from = %prev.name,
            rows = entities.len(),
            derived = derived.as_ref().map(Vec::len).unwrap_or(0),
            "Carried rows from predecessor"
        );
        Ok(Carried { entities, derived })
    }

    fn build(&self, generation: &GenerationConfig) -> Result<GenerationSummary> {
        info!(
            generation = %generation.name,
            mode = ?generation.mode,
            start = %generation.start_date,
            days = generation.num_days,
            "Building generation"
        );

        let lineage = self.lineage_for(&generation.name)?;
        let carried = self.carried_rows(generation)?;
        let mut rng = generation_rng(&self.config.seed, &generation.name);
        let deriver = Deriver::new(generation.derivation.clone())?;

        // Replay draws come before any new day is simulated.
        let carried_derived = match generation.derive {
            DeriveMode::ReplayAndInline => Some(deriver.derive(&carried.entities, &mut rng)),
            DeriveMode::Inline | DeriveMode::None => carried.derived,
        };

        let mut generator = Generator::new(generation.generator_config(), generation.fields.clone())?;
        if generation.derive != DeriveMode::None {
            generator = generator.with_inline_derivation(deriver);
        }
        let output = generator.generate(&mut rng)?;

        self.write(generation, &lineage, &carried.entities, carried_derived, &output)
    }

    fn write(
        &self,
        generation: &GenerationConfig,
        lineage: &Lineage,
        carried: &[EntityRecord],
        carried_derived: Option<Vec<DerivedRecord>>,
        output: &GenerationOutput,
    ) -> Result<GenerationSummary> {
        let path = self.db_path(&generation.name);
        let store = SqliteStore::open(&path)?;
        let schema = &generation.fields;

        store.write_table(ENTITY_TABLE, &entity_table(schema, carried), WriteMode::Replace)?;
        store.write_table(
            ENTITY_TABLE,
            &entity_table(schema, &output.entities),
            WriteMode::Append,
        )?;

        let mut derived_rows = 0;
        let has_derived = carried_derived.is_some() || generation.derive != DeriveMode::None;
        if has_derived {
            let carried_derived = carried_derived.unwrap_or_default();
            derived_rows += store.write_table(
                DERIVED_TABLE,
                &derived_table(&carried_derived),
                WriteMode::Replace,
            )?;
            derived_rows += store.write_table(
                DERIVED_TABLE,
                &derived_table(&output.derived),
                WriteMode::Append,
            )?;
            if derived_rows == 0 {
                warn!(generation = %generation.name, "Derived table is empty");
            }
        } else if store.drop_table(DERIVED_TABLE)? {
            info!(generation = %generation.name, "Removed stale derived table");
        }

        let dates: BTreeSet<_> = carried
            .iter()
            .chain(output.entities.iter())
            .map(|r| r.date_added)
            .collect();
        let history = lineage.history(dates.iter().copied())?;
        store.write_table(SCHEMA_TABLE, &schema_history_table(&history), WriteMode::Replace)?;

        let summary = GenerationSummary {
            name: generation.name.clone(),
            db_path: path,
            schema_version: lineage.current().version,
            carried_rows: carried.len(),
            new_rows: output.entities.len(),
            derived_rows,
            distinct_dates: dates.len(),
            outage_days: output.outage_days.len(),
            spike_days: output.spike_days.len(),
        };
        info!(
            generation = %summary.name,
            rows = summary.carried_rows + summary.new_rows,
            derived = summary.derived_rows,
            outage_days = summary.outage_days,
            "Generation written"
        );
        Ok(summary)
    }
}

//! Day-by-day record generator.
//!
//! One call to [`Generator::step`] simulates one calendar day:
//!
//! 1. outage trigger draw
//! 2. null-spike trigger draw
//! 3. outage days emit nothing and end here
//! 4. otherwise a batch of records is synthesized
//! 5. the null spike decays
//! 6. the day cursor advances
//!
//! Every random value comes from the caller's stream in that fixed order,
//! so a seed reproduces a run exactly.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::{GeneratorConfig, OutageLength};
use crate::derive::Deriver;
use crate::draw::{chance, record_id, unit};
use crate::error::{Result, SynthError};
use crate::schema::Schema;
use crate::state::{GeneratorState, NullSpike};
use crate::types::{Atmosphere, DerivedRecord, EntityRecord, Field, FieldValue};

/// What happened on one simulated day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayReport {
    pub date: NaiveDate,
    /// Length drawn if an outage was triggered today
    pub outage_triggered: Option<u32>,
    /// Length and fields drawn if a null spike was triggered today
    pub spike_triggered: Option<(u32, Vec<Field>)>,
    /// Whether the day was swallowed by an outage
    pub outage: bool,
    /// Whether emitted records were subject to a null spike
    pub spike_active: bool,
    pub entities: Vec<EntityRecord>,
    pub derived: Vec<DerivedRecord>,
}

/// Accumulated output of a full run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    pub entities: Vec<EntityRecord>,
    pub derived: Vec<DerivedRecord>,
    /// Days that emitted no records
    pub outage_days: BTreeSet<NaiveDate>,
    /// Days on which a null spike was active for emitted records
    pub spike_days: BTreeSet<NaiveDate>,
}

impl GenerationOutput {
    /// First emitted day after each outage run: the dates a freshness check
    /// should flag.
    pub fn recovery_dates(&self) -> BTreeSet<NaiveDate> {
        let emitted: BTreeSet<NaiveDate> = self.entities.iter().map(|r| r.date_added).collect();
        self.outage_days
            .iter()
            .filter_map(|day| day.succ_opt())
            .filter(|next| emitted.contains(next))
            .collect()
    }

    /// Distinct `date_added` values in ascending order.
    pub fn update_dates(&self) -> BTreeSet<NaiveDate> {
        self.entities.iter().map(|r| r.date_added).collect()
    }
}

/// Value distributions for present fields.
#[derive(Debug, Clone)]
struct ValueModel {
    distance: Normal<f64>,
    gravity: Normal<f64>,
    orbital_period: Normal<f64>,
    avg_temp: Normal<f64>,
}

impl ValueModel {
    fn new() -> Result<Self> {
        Ok(Self {
            distance: gaussian(50.0, 50.0)?,
            gravity: gaussian(1.0, 5.0)?,
            orbital_period: gaussian(500.0, 300.0)?,
            avg_temp: gaussian(273.0, 50.0)?,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, field: Field, rng: &mut R) -> FieldValue {
        match field {
            Field::Distance => FieldValue::Real(self.distance.sample(rng).abs()),
            Field::Gravity => FieldValue::Real(self.gravity.sample(rng).abs()),
            Field::OrbitalPeriod => FieldValue::Real(self.orbital_period.sample(rng).abs()),
            Field::AvgTemp => FieldValue::Real(self.avg_temp.sample(rng).abs()),
            Field::Eccentricity => FieldValue::Real(unit(rng)),
            Field::Atmosphere => {
                let index = rng.gen_range(0..Atmosphere::ALL.len());
                FieldValue::Atmosphere(Atmosphere::ALL[index])
            }
        }
    }
}

fn gaussian(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| {
        SynthError::InvalidConfig(format!("bad normal({}, {}): {}", mean, std_dev, e))
    })
}

#[derive(Debug, Clone)]
enum OutageSampler {
    Uniform { min: u32, max: u32 },
    FoldedGaussian(Normal<f64>),
}

impl OutageSampler {
    fn new(length: OutageLength) -> Result<Self> {
        Ok(match length {
            OutageLength::Uniform { min, max } => OutageSampler::Uniform { min, max },
            OutageLength::FoldedGaussian { mean, std_dev } => {
                OutageSampler::FoldedGaussian(gaussian(mean, std_dev)?)
            }
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            OutageSampler::Uniform { min, max } => rng.gen_range(*min..=*max),
            OutageSampler::FoldedGaussian(normal) => {
                // Truncate toward zero first, then fold.
                let days = (normal.sample(rng) as i64).unsigned_abs();
                u32::try_from(days).unwrap_or(u32::MAX)
            }
        }
    }
}

/// Anomaly-injecting record generator for one schema.
#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
    schema: Schema,
    spike_candidates: Vec<Field>,
    values: ValueModel,
    outage_length: OutageSampler,
    deriver: Option<Deriver>,
}

impl Generator {
    /// Create a generator. Fails fast on an invalid configuration.
    pub fn new(config: GeneratorConfig, schema: Schema) -> Result<Self> {
        config.validate(&schema)?;
        let spike_candidates = config.spike_candidates(&schema);
        let outage_length = OutageSampler::new(config.outage_length)?;
        Ok(Self {
            config,
            schema,
            spike_candidates,
            values: ValueModel::new()?,
            outage_length,
            deriver: None,
        })
    }

    /// Derive habitability rows for each record right after it is drawn.
    pub fn with_inline_derivation(mut self, deriver: Deriver) -> Self {
        self.deriver = Some(deriver);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn initial_state(&self) -> GeneratorState {
        GeneratorState::new(self.config.start_date)
    }

    /// Run every configured day from a fresh state.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GenerationOutput> {
        self.run(rng, None)
    }

    /// Like [`generate`](Self::generate), but also returns each day's report.
    pub fn generate_with_reports<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<(GenerationOutput, Vec<DayReport>)> {
        let mut reports = Vec::with_capacity(self.config.num_days as usize);
        let output = self.run(rng, Some(&mut reports))?;
        Ok((output, reports))
    }

    fn run<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        mut reports: Option<&mut Vec<DayReport>>,
    ) -> Result<GenerationOutput> {
        info!(
            start = %self.config.start_date,
            days = self.config.num_days,
            fields = self.schema.fields().len(),
            "Generating records"
        );

        let mut output = GenerationOutput::default();
        let mut state = self.initial_state();
        for _ in 0..self.config.num_days {
            let (next, report) = self.step(state, rng)?;
            state = next;

            if report.outage {
                output.outage_days.insert(report.date);
            }
            if report.spike_active {
                output.spike_days.insert(report.date);
            }
            match reports.as_deref_mut() {
                Some(reports) => {
                    output.entities.extend(report.entities.iter().cloned());
                    output.derived.extend(report.derived.iter().cloned());
                    reports.push(report);
                }
                None => {
                    output.entities.extend(report.entities);
                    output.derived.extend(report.derived);
                }
            }
        }

        info!(
            records = output.entities.len(),
            derived = output.derived.len(),
            outage_days = output.outage_days.len(),
            spike_days = output.spike_days.len(),
            "Generation finished"
        );
        Ok(output)
    }

    /// Simulate one day and return the successor state.
    pub fn step<R: Rng + ?Sized>(
        &self,
        mut state: GeneratorState,
        rng: &mut R,
    ) -> Result<(GeneratorState, DayReport)> {
        let date = state.day;
        let next_day = date.succ_opt().ok_or(SynthError::DateOverflow(date))?;
        let mut report = DayReport {
            date,
            outage_triggered: None,
            spike_triggered: None,
            outage: false,
            spike_active: false,
            entities: Vec::new(),
            derived: Vec::new(),
        };

        if chance(rng, self.config.outage_probability_on(date)) {
            let days = self.outage_length.sample(rng);
            debug!(%date, days, "Outage triggered");
            state.outage.trigger(days);
            report.outage_triggered = Some(days);
        }

        if chance(rng, self.config.null_spike_probability_on(date)) {
            let days =
                rng.gen_range(self.config.spike_length.min..=self.config.spike_length.max);
            let fields = self.pick_spike_fields(rng);
            debug!(%date, days, fields = ?fields, "Null spike triggered");
            state.spike.trigger(days, fields.iter().copied());
            report.spike_triggered = Some((days, fields));
        }

        if state.outage.is_active() {
            state.outage.tick();
            state.day = next_day;
            report.outage = true;
            return Ok((state, report));
        }

        report.spike_active = state.spike.is_active();
        let batch = rng.gen_range(self.config.batch_size.min..=self.config.batch_size.max);
        report.entities.reserve(batch as usize);
        for _ in 0..batch {
            let record = self.synthesize_record(date, &state.spike, rng);
            if let Some(deriver) = &self.deriver {
                deriver.derive_into(&record, rng, &mut report.derived);
            }
            report.entities.push(record);
        }

        state.spike.decay();
        state.day = next_day;
        Ok((state, report))
    }

    /// Draw one record for `date` under the given spike.
    ///
    /// Presence draws happen for every schema field first, then the severity
    /// draws for spiked fields. Both nulling mechanisms compose.
    pub fn synthesize_record<R: Rng + ?Sized>(
        &self,
        date: NaiveDate,
        spike: &NullSpike,
        rng: &mut R,
    ) -> EntityRecord {
        let mut record = EntityRecord::new(record_id(rng), date);

        for field in self.schema.fields() {
            let presence = self.config.presence.probability(*field).unwrap_or(0.0);
            if chance(rng, presence) {
                record.set(*field, Some(self.values.sample(*field, rng)));
            }
        }

        for field in self.schema.fields() {
            if spike.targets(*field) && chance(rng, self.config.null_spike_severity) {
                record.set(*field, None);
            }
        }

        record
    }

    /// Random non-empty subset of the spike candidates.
    fn pick_spike_fields<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Field> {
        if self.spike_candidates.is_empty() {
            return Vec::new();
        }
        let count = rng.gen_range(1..=self.spike_candidates.len());
        let mut fields: Vec<Field> = self
            .spike_candidates
            .choose_multiple(rng, count)
            .copied()
            .collect();
        fields.sort();
        fields
    }
}

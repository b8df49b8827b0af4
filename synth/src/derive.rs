//! Derived habitability table.
//!
//! Each source record yields one derived row, and a second noisy row whenever
//! the first one comes out with zero habitability.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::draw::{chance, unit};
use crate::error::{Result, SynthError};
use crate::types::{DerivedRecord, EntityRecord};

/// Tunables for the derived table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeriveConfig {
    /// Probability of clamping each temperature bound when eccentricity is known
    #[serde(default = "default_clamp_probability")]
    pub clamp_probability: f64,
    /// Value a clamped minimum temperature takes
    #[serde(default)]
    pub min_temp_sentinel: f64,
    /// Value a clamped maximum temperature takes
    #[serde(default = "default_max_temp_sentinel")]
    pub max_temp_sentinel: f64,
    /// Scale applied to perihelion and aphelion
    #[serde(default = "default_orbit_scale")]
    pub orbit_scale: f64,
    /// Emit a redrawn companion row after every zero-habitability row
    #[serde(default = "default_true")]
    pub duplicate_non_habitable: bool,
}

fn default_clamp_probability() -> f64 {
    0.85
}
fn default_max_temp_sentinel() -> f64 {
    999_999.0
}
fn default_orbit_scale() -> f64 {
    0.2
}
fn default_true() -> bool {
    true
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            clamp_probability: default_clamp_probability(),
            min_temp_sentinel: 0.0,
            max_temp_sentinel: default_max_temp_sentinel(),
            orbit_scale: default_orbit_scale(),
            duplicate_non_habitable: true,
        }
    }
}

/// Computes derived rows from entity records.
#[derive(Debug, Clone)]
pub struct Deriver {
    config: DeriveConfig,
}

impl Deriver {
    pub fn new(config: DeriveConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.clamp_probability) {
            return Err(SynthError::InvalidConfig(format!(
                "clamp_probability must be within [0, 1], got {}",
                config.clamp_probability
            )));
        }
        if !config.orbit_scale.is_finite() {
            return Err(SynthError::InvalidConfig(
                "orbit_scale must be finite".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &DeriveConfig {
        &self.config
    }

    /// Derive rows for every source record, in order.
    pub fn derive<R: Rng + ?Sized>(
        &self,
        sources: &[EntityRecord],
        rng: &mut R,
    ) -> Vec<DerivedRecord> {
        let mut out = Vec::with_capacity(sources.len());
        for source in sources {
            self.derive_into(source, rng, &mut out);
        }
        debug!(
            sources = sources.len(),
            rows = out.len(),
            "Derived habitability rows"
        );
        out
    }

    /// Derive the row(s) for one source record and append them to `out`.
    pub fn derive_into<R: Rng + ?Sized>(
        &self,
        source: &EntityRecord,
        rng: &mut R,
        out: &mut Vec<DerivedRecord>,
    ) {
        let mut min_temp = None;
        let mut max_temp = None;
        let mut clamped = false;

        if let Some(avg) = source.avg_temp {
            min_temp = Some(unit(rng) * avg);
            max_temp = Some((1.0 + unit(rng)) * avg);
            if source.eccentricity.is_some() {
                if chance(rng, self.config.clamp_probability) {
                    min_temp = Some(self.config.min_temp_sentinel);
                    clamped = true;
                }
                if chance(rng, self.config.clamp_probability) {
                    max_temp = Some(self.config.max_temp_sentinel);
                    clamped = true;
                }
            }
        }

        let (perihelion, aphelion) = match (source.eccentricity, source.orbital_period) {
            (Some(e), Some(period)) => (
                Some(e * period * self.config.orbit_scale),
                Some((2.0 - e) * period * self.config.orbit_scale),
            ),
            _ => (None, None),
        };

        let mut habitability = unit(rng);
        if clamped {
            habitability = 0.0;
        }

        let row = DerivedRecord {
            id: source.id,
            perihelion,
            aphelion,
            atmosphere: source.atmosphere,
            habitability,
            min_temp,
            max_temp,
            date_added: source.date_added,
        };

        if habitability == 0.0 && self.config.duplicate_non_habitable {
            // Companion rows skip the clamp check.
            let habitability = unit(rng);
            let (min_temp, max_temp) = match source.avg_temp {
                Some(avg) => (Some(unit(rng) * avg), Some((1.0 + unit(rng)) * avg)),
                None => (None, None),
            };
            let companion = DerivedRecord {
                habitability,
                min_temp,
                max_temp,
                ..row.clone()
            };
            out.push(row);
            out.push(companion);
        } else {
            out.push(row);
        }
    }
}

impl Default for Deriver {
    fn default() -> Self {
        Self {
            config: DeriveConfig::default(),
        }
    }
}

//! Record and field types shared by the generator and the derived table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SynthError;
use crate::schema::ColumnType;

/// A nullable column of the primary table.
///
/// Variant order is the column order of the full schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Distance from the observer
    Distance,
    /// Surface gravity
    #[serde(rename = "g")]
    Gravity,
    /// Orbital period in days
    OrbitalPeriod,
    /// Average surface temperature in kelvin
    AvgTemp,
    /// Orbital eccentricity in [0, 1)
    Eccentricity,
    /// Dominant atmospheric gas
    Atmosphere,
}

impl Field {
    /// Fields of the first generation.
    pub const BASE: [Field; 4] = [
        Field::Distance,
        Field::Gravity,
        Field::OrbitalPeriod,
        Field::AvgTemp,
    ];

    /// Superset of every field ever added.
    pub const ALL: [Field; 6] = [
        Field::Distance,
        Field::Gravity,
        Field::OrbitalPeriod,
        Field::AvgTemp,
        Field::Eccentricity,
        Field::Atmosphere,
    ];

    /// Column name in the relational store.
    pub fn column(&self) -> &'static str {
        match self {
            Field::Distance => "distance",
            Field::Gravity => "g",
            Field::OrbitalPeriod => "orbital_period",
            Field::AvgTemp => "avg_temp",
            Field::Eccentricity => "eccentricity",
            Field::Atmosphere => "atmosphere",
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Field::Atmosphere => ColumnType::Text,
            _ => ColumnType::Real,
        }
    }

    /// Probability that the field carries a value on an ordinary day.
    pub fn default_presence(&self) -> f64 {
        match self {
            Field::Distance => 0.95,
            Field::Gravity => 0.85,
            Field::OrbitalPeriod => 0.75,
            Field::AvgTemp => 0.60,
            Field::Eccentricity => 0.75,
            Field::Atmosphere => 0.40,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Field {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.column().eq_ignore_ascii_case(s))
            .ok_or_else(|| SynthError::UnknownField(s.to_string()))
    }
}

/// Atmosphere category, drawn uniformly when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Atmosphere {
    #[serde(rename = "O2")]
    O2,
    #[serde(rename = "N2")]
    N2,
    #[serde(rename = "CO2")]
    Co2,
    #[serde(rename = "H2SO4")]
    H2so4,
}

impl Atmosphere {
    pub const ALL: [Atmosphere; 4] = [
        Atmosphere::O2,
        Atmosphere::N2,
        Atmosphere::Co2,
        Atmosphere::H2so4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Atmosphere::O2 => "O2",
            Atmosphere::N2 => "N2",
            Atmosphere::Co2 => "CO2",
            Atmosphere::H2so4 => "H2SO4",
        }
    }
}

impl fmt::Display for Atmosphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Atmosphere {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Atmosphere::ALL
            .iter()
            .copied()
            .find(|gas| gas.as_str() == s)
            .ok_or_else(|| SynthError::UnknownAtmosphere(s.to_string()))
    }
}

/// A single present value of a nullable field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Real(f64),
    Atmosphere(Atmosphere),
}

/// One row of the primary table.
///
/// `date_added` is the only mandatory column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub distance: Option<f64>,
    pub g: Option<f64>,
    pub orbital_period: Option<f64>,
    pub avg_temp: Option<f64>,
    pub eccentricity: Option<f64>,
    pub atmosphere: Option<Atmosphere>,
    pub date_added: NaiveDate,
}

impl EntityRecord {
    /// Create a record with every nullable field absent.
    pub fn new(id: Uuid, date_added: NaiveDate) -> Self {
        Self {
            id,
            distance: None,
            g: None,
            orbital_period: None,
            avg_temp: None,
            eccentricity: None,
            atmosphere: None,
            date_added,
        }
    }

    pub fn value(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Distance => self.distance.map(FieldValue::Real),
            Field::Gravity => self.g.map(FieldValue::Real),
            Field::OrbitalPeriod => self.orbital_period.map(FieldValue::Real),
            Field::AvgTemp => self.avg_temp.map(FieldValue::Real),
            Field::Eccentricity => self.eccentricity.map(FieldValue::Real),
            Field::Atmosphere => self.atmosphere.map(FieldValue::Atmosphere),
        }
    }

    /// Set or clear a field. A value of the wrong kind clears the field.
    pub fn set(&mut self, field: Field, value: Option<FieldValue>) {
        let real = match value {
            Some(FieldValue::Real(v)) => Some(v),
            _ => None,
        };
        match field {
            Field::Distance => self.distance = real,
            Field::Gravity => self.g = real,
            Field::OrbitalPeriod => self.orbital_period = real,
            Field::AvgTemp => self.avg_temp = real,
            Field::Eccentricity => self.eccentricity = real,
            Field::Atmosphere => {
                self.atmosphere = match value {
                    Some(FieldValue::Atmosphere(gas)) => Some(gas),
                    _ => None,
                }
            }
        }
    }

    pub fn is_null(&self, field: Field) -> bool {
        self.value(field).is_none()
    }
}

/// One row of the derived (habitability) table.
///
/// Temperatures and orbit bounds are `None` where the source record lacked
/// the inputs needed to compute them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub perihelion: Option<f64>,
    pub aphelion: Option<f64>,
    pub atmosphere: Option<Atmosphere>,
    pub habitability: f64,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub date_added: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_parse_by_column_name() {
        assert_eq!("g".parse::<Field>().unwrap(), Field::Gravity);
        assert_eq!("AVG_TEMP".parse::<Field>().unwrap(), Field::AvgTemp);
        assert!("dist".parse::<Field>().is_err());
    }

    #[test]
    fn test_set_clears_on_kind_mismatch() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut record = EntityRecord::new(Uuid::nil(), date);
        record.set(Field::AvgTemp, Some(FieldValue::Real(273.0)));
        assert_eq!(record.avg_temp, Some(273.0));

        record.set(Field::AvgTemp, Some(FieldValue::Atmosphere(Atmosphere::N2)));
        assert!(record.is_null(Field::AvgTemp));

        record.set(Field::Atmosphere, Some(FieldValue::Atmosphere(Atmosphere::Co2)));
        assert_eq!(record.atmosphere, Some(Atmosphere::Co2));
    }

    #[test]
    fn test_atmosphere_serde_symbols() {
        let encoded = serde_json::to_string(&Atmosphere::H2so4).unwrap();
        assert_eq!(encoded, "\"H2SO4\"");
        assert_eq!("CO2".parse::<Atmosphere>().unwrap(), Atmosphere::Co2);
    }
}

//! Schema versions and the lineage that orders them.
//!
//! Columns are only ever added across a lineage. Each version records the
//! first calendar day it applies to, which is what the schema-history audit
//! table is built from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Result, SynthError};
use crate::types::Field;

/// Identifier column, always first.
pub const ID_COLUMN: &str = "_id";

/// Mandatory calendar-date column.
pub const DATE_COLUMN: &str = "date_added";

/// SQL storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Real,
    Text,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Column description used for table creation and the schema history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
        }
    }
}

/// Ordered set of nullable fields carried by a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Create a schema. Fields must be non-empty and unique.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(SynthError::InvalidConfig(
                "schema needs at least one nullable field".to_string(),
            ));
        }
        let unique: BTreeSet<_> = fields.iter().collect();
        if unique.len() != fields.len() {
            return Err(SynthError::InvalidConfig(format!(
                "schema lists a field twice: {:?}",
                fields
            )));
        }
        Ok(Self { fields })
    }

    /// The four fields of the first generation.
    pub fn base() -> Self {
        Self {
            fields: Field::BASE.to_vec(),
        }
    }

    /// Superset schema with every known field.
    pub fn full() -> Self {
        Self {
            fields: Field::ALL.to_vec(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Fields of `previous` that this schema no longer has.
    pub fn missing_from(&self, previous: &Schema) -> Vec<Field> {
        previous
            .fields
            .iter()
            .copied()
            .filter(|field| !self.contains(*field))
            .collect()
    }

    /// Full column list: id, nullable fields, then the date column.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::with_capacity(self.fields.len() + 2);
        columns.push(Column::new(ID_COLUMN, ColumnType::Text, false));
        for field in &self.fields {
            columns.push(Column::new(field.column(), field.column_type(), true));
        }
        columns.push(Column::new(DATE_COLUMN, ColumnType::Text, false));
        columns
    }

    /// JSON description of the column list, as stored in the history table.
    pub fn describe(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Described<'a> {
            position: usize,
            #[serde(flatten)]
            column: &'a Column,
        }

        let columns = self.columns();
        let described: Vec<_> = columns
            .iter()
            .enumerate()
            .map(|(position, column)| Described { position, column })
            .collect();
        serde_json::to_string(&described).map_err(|e| SynthError::Describe(e.to_string()))
    }
}

impl TryFrom<Vec<Field>> for Schema {
    type Error = SynthError;

    fn try_from(fields: Vec<Field>) -> Result<Self> {
        Schema::new(fields)
    }
}

impl From<Schema> for Vec<Field> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

/// A schema together with the first day it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub version: u32,
    pub schema: Schema,
    pub active_from: NaiveDate,
}

/// One row of the schema-history audit table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaHistoryEntry {
    pub date: NaiveDate,
    pub version: u32,
    pub schema: String,
}

/// Ordered schema versions of one dataset snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    versions: Vec<SchemaVersion>,
}

impl Lineage {
    /// Start a lineage at version 1.
    pub fn new(schema: Schema, active_from: NaiveDate) -> Self {
        Self {
            versions: vec![SchemaVersion {
                version: 1,
                schema,
                active_from,
            }],
        }
    }

    pub fn versions(&self) -> &[SchemaVersion] {
        &self.versions
    }

    pub fn current(&self) -> &SchemaVersion {
        // Constructors always seed one version.
        &self.versions[self.versions.len() - 1]
    }

    /// Append a version. Rejected if it drops a column or does not start
    /// strictly after the current version.
    pub fn evolve(&mut self, schema: Schema, active_from: NaiveDate) -> Result<&SchemaVersion> {
        let current = self.current();
        let version = current.version + 1;
        check_monotonic(&current.schema, &schema, version)?;
        if active_from <= current.active_from {
            return Err(SynthError::InvalidConfig(format!(
                "schema version {} must start after {}, got {}",
                version, current.active_from, active_from
            )));
        }
        self.versions.push(SchemaVersion {
            version,
            schema,
            active_from,
        });
        Ok(self.current())
    }

    /// Begin an independent snapshot that still keeps every column.
    pub fn regenerate(&self, schema: Schema, active_from: NaiveDate) -> Result<Lineage> {
        let version = self.current().version + 1;
        check_monotonic(&self.current().schema, &schema, version)?;
        Ok(Lineage {
            versions: vec![SchemaVersion {
                version,
                schema,
                active_from,
            }],
        })
    }

    /// Version active on `date`, if the date is not before the first version.
    pub fn version_on(&self, date: NaiveDate) -> Option<&SchemaVersion> {
        self.versions
            .iter()
            .rev()
            .find(|version| version.active_from <= date)
    }

    /// History rows for the given distinct dates, in ascending date order.
    /// Dates before the first version fall back to the first version.
    pub fn history<I>(&self, dates: I) -> Result<Vec<SchemaHistoryEntry>>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let distinct: BTreeSet<NaiveDate> = dates.into_iter().collect();
        distinct
            .into_iter()
            .map(|date| {
                let version = self.version_on(date).unwrap_or(&self.versions[0]);
                Ok(SchemaHistoryEntry {
                    date,
                    version: version.version,
                    schema: version.schema.describe()?,
                })
            })
            .collect()
    }
}

fn check_monotonic(previous: &Schema, next: &Schema, version: u32) -> Result<()> {
    let missing = next.missing_from(previous);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SynthError::NonMonotonicSchema {
            version,
            missing: missing.iter().map(|f| f.column().to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_columns_wrap_fields() {
        let columns = Schema::base().columns();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["_id", "distance", "g", "orbital_period", "avg_temp", "date_added"]
        );
        assert!(!columns[0].nullable);
        assert!(!columns[5].nullable);
        assert!(columns[1..5].iter().all(|c| c.nullable));
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        assert!(Schema::new(vec![Field::Distance, Field::Distance]).is_err());
        assert!(Schema::new(vec![]).is_err());
    }

    #[test]
    fn test_evolve_rejects_dropped_column() {
        let mut lineage = Lineage::new(Schema::full(), date(2020, 1, 1));
        let err = lineage
            .evolve(Schema::base(), date(2020, 2, 1))
            .unwrap_err();
        assert!(matches!(err, SynthError::NonMonotonicSchema { version: 2, .. }));
    }

    #[test]
    fn test_history_switches_on_activation_date() {
        let mut lineage = Lineage::new(Schema::base(), date(2020, 1, 1));
        lineage.evolve(Schema::full(), date(2020, 7, 19)).unwrap();

        let history = lineage
            .history(vec![date(2020, 7, 18), date(2020, 7, 19), date(2020, 7, 18)])
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[1].version, 2);
        assert!(history[1].schema.contains("\"atmosphere\""));
        assert!(!history[0].schema.contains("\"atmosphere\""));
    }

    #[test]
    fn test_describe_is_positional_json() {
        let described: serde_json::Value =
            serde_json::from_str(&Schema::base().describe().unwrap()).unwrap();
        assert_eq!(described[0]["position"], 0);
        assert_eq!(described[0]["name"], "_id");
        assert_eq!(described[2]["type"], "REAL");
    }
}

//! Mapping between generated records and store tables.

use chrono::NaiveDate;
use downtime_synth::{
    Atmosphere, Column, ColumnType, DerivedRecord, EntityRecord, Field, FieldValue, Schema,
    SchemaHistoryEntry, DATE_COLUMN, ID_COLUMN,
};
use uuid::Uuid;

use crate::error::{DowntimeError, Result};
use crate::store::{Table, Value};

/// Primary entity table.
pub const ENTITY_TABLE: &str = "EXOPLANETS";
/// Derived habitability table.
pub const DERIVED_TABLE: &str = "HABITABLES";
/// Schema history audit table.
pub const SCHEMA_TABLE: &str = "EXOPLANETS_SCHEMA";

const DATE_FORMAT: &str = "%Y-%m-%d";

fn date_cell(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

fn field_cell(value: Option<FieldValue>) -> Value {
    match value {
        Some(FieldValue::Real(v)) => Value::Real(v),
        Some(FieldValue::Atmosphere(gas)) => Value::Text(gas.as_str().to_string()),
        None => Value::Null,
    }
}

fn atmosphere_cell(gas: Option<Atmosphere>) -> Value {
    field_cell(gas.map(FieldValue::Atmosphere))
}

/// Entity records under `schema`. Fields outside the schema are not written.
pub fn entity_table(schema: &Schema, records: &[EntityRecord]) -> Table {
    let mut table = Table::new(schema.columns());
    table.rows.reserve(records.len());
    for record in records {
        let mut row = Vec::with_capacity(table.columns.len());
        row.push(Value::Text(record.id.to_string()));
        for field in schema.fields() {
            row.push(field_cell(record.value(*field)));
        }
        row.push(date_cell(record.date_added));
        table.rows.push(row);
    }
    table
}

/// Read entity records back, along with the schema their columns describe.
pub fn entities_from_table(table: &Table) -> Result<(Schema, Vec<EntityRecord>)> {
    let id_at = required_column(table, ID_COLUMN)?;
    let date_at = required_column(table, DATE_COLUMN)?;

    let mut fields = Vec::new();
    for (index, column) in table.columns.iter().enumerate() {
        if index == id_at || index == date_at {
            continue;
        }
        fields.push((index, column.name.parse::<Field>()?));
    }
    let schema = Schema::new(fields.iter().map(|(_, f)| *f).collect())?;

    let mut records = Vec::with_capacity(table.len());
    for row in &table.rows {
        let mut record = EntityRecord::new(parse_id(&row[id_at])?, parse_date(&row[date_at])?);
        for (index, field) in &fields {
            record.set(*field, parse_field(*field, &row[*index])?);
        }
        records.push(record);
    }
    Ok((schema, records))
}

/// Columns of the derived table, in stored order.
pub fn derived_columns() -> Vec<Column> {
    vec![
        Column::new(ID_COLUMN, ColumnType::Text, false),
        Column::new("perihelion", ColumnType::Real, true),
        Column::new("aphelion", ColumnType::Real, true),
        Column::new("atmosphere", ColumnType::Text, true),
        Column::new("habitability", ColumnType::Real, false),
        Column::new("min_temp", ColumnType::Real, true),
        Column::new("max_temp", ColumnType::Real, true),
        Column::new(DATE_COLUMN, ColumnType::Text, false),
    ]
}

pub fn derived_table(records: &[DerivedRecord]) -> Table {
    let mut table = Table::new(derived_columns());
    table.rows = records
        .iter()
        .map(|r| {
            vec![
                Value::Text(r.id.to_string()),
                Value::from(r.perihelion),
                Value::from(r.aphelion),
                atmosphere_cell(r.atmosphere),
                Value::Real(r.habitability),
                Value::from(r.min_temp),
                Value::from(r.max_temp),
                date_cell(r.date_added),
            ]
        })
        .collect();
    table
}

pub fn derived_from_table(table: &Table) -> Result<Vec<DerivedRecord>> {
    let at = |name: &str| required_column(table, name);
    let (id, perihelion, aphelion, atmosphere, habitability, min_temp, max_temp, date) = (
        at(ID_COLUMN)?,
        at("perihelion")?,
        at("aphelion")?,
        at("atmosphere")?,
        at("habitability")?,
        at("min_temp")?,
        at("max_temp")?,
        at(DATE_COLUMN)?,
    );

    table
        .rows
        .iter()
        .map(|row| {
            Ok(DerivedRecord {
                id: parse_id(&row[id])?,
                perihelion: parse_real(&row[perihelion])?,
                aphelion: parse_real(&row[aphelion])?,
                atmosphere: parse_atmosphere(&row[atmosphere])?,
                habitability: parse_real(&row[habitability])?.ok_or_else(|| {
                    DowntimeError::Row("habitability is null".to_string())
                })?,
                min_temp: parse_real(&row[min_temp])?,
                max_temp: parse_real(&row[max_temp])?,
                date_added: parse_date(&row[date])?,
            })
        })
        .collect()
}

pub fn schema_history_table(entries: &[SchemaHistoryEntry]) -> Table {
    let mut table = Table::new(vec![
        Column::new("date", ColumnType::Text, false),
        Column::new("schema", ColumnType::Text, false),
    ]);
    table.rows = entries
        .iter()
        .map(|e| vec![date_cell(e.date), Value::Text(e.schema.clone())])
        .collect();
    table
}

fn required_column(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| DowntimeError::Row(format!("missing column {}", name)))
}

fn parse_id(cell: &Value) -> Result<Uuid> {
    let raw = cell
        .as_str()
        .ok_or_else(|| DowntimeError::Row(format!("id is not text: {:?}", cell)))?;
    Uuid::parse_str(raw).map_err(|e| DowntimeError::Row(format!("bad id {:?}: {}", raw, e)))
}

fn parse_date(cell: &Value) -> Result<NaiveDate> {
    let raw = cell
        .as_str()
        .ok_or_else(|| DowntimeError::Row(format!("date is not text: {:?}", cell)))?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| DowntimeError::Row(format!("bad date {:?}: {}", raw, e)))
}

fn parse_real(cell: &Value) -> Result<Option<f64>> {
    match cell {
        Value::Null => Ok(None),
        other => other
            .as_f64()
            .map(Some)
            .ok_or_else(|| DowntimeError::Row(format!("expected a number, got {:?}", other))),
    }
}

fn parse_atmosphere(cell: &Value) -> Result<Option<Atmosphere>> {
    match cell {
        Value::Null => Ok(None),
        Value::Text(raw) => Ok(Some(raw.parse::<Atmosphere>()?)),
        other => Err(DowntimeError::Row(format!(
            "expected an atmosphere, got {:?}",
            other
        ))),
    }
}

fn parse_field(field: Field, cell: &Value) -> Result<Option<FieldValue>> {
    Ok(match field.column_type() {
        ColumnType::Real => parse_real(cell)?.map(FieldValue::Real),
        ColumnType::Text => parse_atmosphere(cell)?.map(FieldValue::Atmosphere),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 7, 19).unwrap()
    }

    #[test]
    fn test_entities_survive_the_table_mapping() {
        let mut record = EntityRecord::new(Uuid::from_u128(7), date());
        record.distance = Some(12.5);
        record.atmosphere = Some(Atmosphere::Co2);

        let table = entity_table(&Schema::full(), &[record.clone()]);
        assert_eq!(table.columns.len(), 8);
        assert_eq!(table.rows[0][6], Value::Text("CO2".to_string()));

        let (schema, records) = entities_from_table(&table).unwrap();
        assert_eq!(schema, Schema::full());
        assert_eq!(records, vec![record]);
    }

    #[test]
    fn test_base_schema_drops_extra_fields() {
        let mut record = EntityRecord::new(Uuid::from_u128(1), date());
        record.eccentricity = Some(0.3);
        let table = entity_table(&Schema::base(), &[record]);
        assert_eq!(table.columns.len(), 6);
        assert!(table.column_index("eccentricity").is_none());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let mut table = entity_table(&Schema::base(), &[]);
        table.columns[1].name = "mass".to_string();
        assert!(matches!(
            entities_from_table(&table),
            Err(DowntimeError::Synth(_))
        ));
    }

    #[test]
    fn test_derived_rows_map_back() {
        let row = DerivedRecord {
            id: Uuid::from_u128(9),
            perihelion: None,
            aphelion: None,
            atmosphere: Some(Atmosphere::H2so4),
            habitability: 0.0,
            min_temp: Some(0.0),
            max_temp: Some(999_999.0),
            date_added: date(),
        };
        let table = derived_table(&[row.clone()]);
        assert_eq!(derived_from_table(&table).unwrap(), vec![row]);
    }
}

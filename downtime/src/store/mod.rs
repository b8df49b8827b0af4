//! Relational store abstraction.
//!
//! Tables are written whole: either replacing a named table or appending
//! rows to it. There are no partial updates.
//!
//! ## Tables
//!
//! - `EXOPLANETS` - primary entity records
//! - `HABITABLES` - derived habitability rows
//! - `EXOPLANETS_SCHEMA` - schema active on each distinct `date_added`

pub mod sqlite;

use downtime_synth::Column;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use crate::error::{DowntimeError, Result};

pub use sqlite::SqliteStore;

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell. Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn from_ref(value: ValueRef<'_>) -> Result<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(bytes) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|e| DowntimeError::Row(format!("invalid UTF-8 text: {}", e)))?
                    .to_string(),
            ),
            ValueRef::Blob(_) => {
                return Err(DowntimeError::Row("blob cells are not supported".to_string()))
            }
        })
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map(Value::Real).unwrap_or(Value::Null)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(v) => ToSqlOutput::from(*v),
            Value::Real(v) => ToSqlOutput::from(*v),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// Column list plus row-major cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Its width must match the column list.
    pub fn push(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DowntimeError::Row(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop and recreate the table
    Replace,
    /// Create the table if missing, then insert
    Append,
}

/// Whole-table persistence.
pub trait RelationalStore {
    /// Write `table` under `name` and return the number of rows inserted.
    fn write_table(&self, name: &str, table: &Table, mode: WriteMode) -> Result<usize>;

    fn read_table(&self, name: &str) -> Result<Table>;

    /// Run a query and return every result row.
    fn execute(&self, sql: &str) -> Result<Vec<Vec<Value>>>;

    fn table_exists(&self, name: &str) -> Result<bool>;

    /// Drop `name` if present. Returns whether a table was dropped.
    fn drop_table(&self, name: &str) -> Result<bool>;
}

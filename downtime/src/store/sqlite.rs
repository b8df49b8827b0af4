//! SQLite-backed relational store.

use chrono::NaiveDate;
use downtime_freshness::DateGap;
use downtime_synth::{Column, ColumnType, DATE_COLUMN};
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{RelationalStore, Table, Value, WriteMode};
use crate::error::{DowntimeError, Result};

/// One SQLite database file per generation.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening SQLite database at {:?}", path);
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DowntimeError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DowntimeError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    pub fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Distinct update dates of `table`, ascending.
    pub fn distinct_dates(&self, table: &str) -> Result<BTreeSet<NaiveDate>> {
        let sql = format!(
            "SELECT DISTINCT {} FROM {}",
            quote_ident(DATE_COLUMN),
            quote_ident(table)
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let raw = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.iter().map(|s| parse_date(s)).collect()
        })
    }

    /// Dates whose gap since the previous distinct date exceeds `threshold`,
    /// computed inside SQLite.
    pub fn freshness_anomalies(&self, table: &str, threshold: u32) -> Result<Vec<DateGap>> {
        let date = quote_ident(DATE_COLUMN);
        let sql = format!(
            "WITH updates AS (
                 SELECT {date} AS date_added, COUNT(*) AS rows_added
                 FROM {table}
                 GROUP BY {date}
             ),
             gaps AS (
                 SELECT date_added,
                        JULIANDAY(date_added)
                          - JULIANDAY(LAG(date_added) OVER (ORDER BY date_added))
                          AS days_since_update
                 FROM updates
             )
             SELECT date_added, days_since_update
             FROM gaps
             WHERE days_since_update > ?1
             ORDER BY date_added",
            date = date,
            table = quote_ident(table),
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let raw = stmt
                .query_map([i64::from(threshold)], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.into_iter()
                .map(|(date, days)| {
                    Ok(DateGap {
                        date: parse_date(&date)?,
                        days_since_previous: days.round() as i64,
                    })
                })
                .collect()
        })
    }

    fn columns_of(conn: &Connection, name: &str) -> Result<Vec<Column>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(name));
        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(column, declared, notnull)| {
                let column_type = match declared.to_ascii_uppercase().as_str() {
                    "REAL" => ColumnType::Real,
                    "TEXT" => ColumnType::Text,
                    other => {
                        return Err(DowntimeError::Row(format!(
                            "column {}.{} has unsupported type {}",
                            name, column, other
                        )))
                    }
                };
                Ok(Column::new(column, column_type, notnull == 0))
            })
            .collect()
    }
}

impl RelationalStore for SqliteStore {
    fn write_table(&self, name: &str, table: &Table, mode: WriteMode) -> Result<usize> {
        if table.columns.is_empty() {
            return Err(DowntimeError::Row(format!("table {} has no columns", name)));
        }
        let ident = quote_ident(name);
        let definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", quote_ident(&c.name), c.column_type.sql());
                if !c.nullable {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();
        let names: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            ident,
            names.join(", "),
            placeholders.join(", ")
        );

        let written = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if mode == WriteMode::Replace {
                tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", ident))?;
            }
            tx.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                ident,
                definitions.join(", ")
            ))?;
            {
                let mut stmt = tx.prepare(&insert)?;
                for row in &table.rows {
                    if row.len() != table.columns.len() {
                        return Err(DowntimeError::Row(format!(
                            "row has {} cells but table {} has {} columns",
                            row.len(),
                            name,
                            table.columns.len()
                        )));
                    }
                    stmt.execute(params_from_iter(row.iter()))?;
                }
            }
            tx.commit()?;
            Ok(table.rows.len())
        })?;

        info!(table = name, rows = written, mode = ?mode, "Wrote table");
        Ok(written)
    }

    fn read_table(&self, name: &str) -> Result<Table> {
        self.with_conn(|conn| {
            let columns = Self::columns_of(conn, name)?;
            if columns.is_empty() {
                return Err(DowntimeError::Row(format!("table {} does not exist", name)));
            }
            let mut table = Table::new(columns);
            let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(name)))?;
            let width = stmt.column_count();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut cells = Vec::with_capacity(width);
                for i in 0..width {
                    cells.push(Value::from_ref(row.get_ref(i)?)?);
                }
                table.push(cells)?;
            }
            debug!(table = name, rows = table.len(), "Read table");
            Ok(table)
        })
    }

    fn execute(&self, sql: &str) -> Result<Vec<Vec<Value>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let width = stmt.column_count();
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut cells = Vec::with_capacity(width);
                for i in 0..width {
                    cells.push(Value::from_ref(row.get_ref(i)?)?);
                }
                out.push(cells);
            }
            Ok(out)
        })
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    fn drop_table(&self, name: &str) -> Result<bool> {
        if !self.table_exists(name)? {
            return Ok(false);
        }
        self.with_conn(|conn| {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)))?;
            Ok(())
        })?;
        info!(table = name, "Dropped table");
        Ok(true)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DowntimeError::Row(format!("bad date {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec![
            Column::new("_id", ColumnType::Text, false),
            Column::new("avg_temp", ColumnType::Real, true),
            Column::new("date_added", ColumnType::Text, false),
        ]);
        for (id, temp, date) in [
            ("a", Some(280.0), "2020-01-01"),
            ("b", None, "2020-01-01"),
            ("c", Some(300.5), "2020-01-02"),
            ("d", Some(250.0), "2020-01-05"),
        ] {
            table
                .push(vec![
                    Value::Text(id.to_string()),
                    Value::from(temp),
                    Value::Text(date.to_string()),
                ])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_write_and_read_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.table_exists("EXOPLANETS").unwrap());

        let table = sample();
        assert_eq!(store.write_table("EXOPLANETS", &table, WriteMode::Replace).unwrap(), 4);
        assert!(store.table_exists("EXOPLANETS").unwrap());

        let read = store.read_table("EXOPLANETS").unwrap();
        assert_eq!(read, table);
        assert!(!read.columns[0].nullable);
        assert!(read.columns[1].nullable);
    }

    #[test]
    fn test_append_then_replace() {
        let store = SqliteStore::open_in_memory().unwrap();
        let table = sample();
        store.write_table("T", &table, WriteMode::Append).unwrap();
        store.write_table("T", &table, WriteMode::Append).unwrap();
        assert_eq!(store.row_count("T").unwrap(), 8);

        store.write_table("T", &table, WriteMode::Replace).unwrap();
        assert_eq!(store.row_count("T").unwrap(), 4);
    }

    #[test]
    fn test_freshness_query_matches_gaps() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write_table("EXOPLANETS", &sample(), WriteMode::Replace).unwrap();

        let dates = store.distinct_dates("EXOPLANETS").unwrap();
        assert_eq!(dates.len(), 3);

        let flagged = store.freshness_anomalies("EXOPLANETS", 0).unwrap();
        assert_eq!(flagged.len(), 2);
        let flagged = store.freshness_anomalies("EXOPLANETS", 1).unwrap();
        assert_eq!(
            flagged,
            vec![DateGap {
                date: NaiveDate::from_ymd_opt(2020, 1, 5).unwrap(),
                days_since_previous: 3,
            }]
        );
    }

    #[test]
    fn test_execute_returns_cells() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write_table("EXOPLANETS", &sample(), WriteMode::Replace).unwrap();
        let rows = store
            .execute("SELECT COUNT(*), AVG(avg_temp) FROM EXOPLANETS")
            .unwrap();
        assert_eq!(rows[0][0], Value::Integer(4));
        let mean = rows[0][1].as_f64().unwrap();
        assert!((mean - 830.5 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write_table("HABITABLES", &sample(), WriteMode::Replace).unwrap();
        assert!(store.drop_table("HABITABLES").unwrap());
        assert!(!store.table_exists("HABITABLES").unwrap());
        assert!(!store.drop_table("HABITABLES").unwrap());
    }

    #[test]
    fn test_read_missing_table_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(store.read_table("NOPE"), Err(DowntimeError::Row(_))));
    }
}

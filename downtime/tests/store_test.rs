//! SQLite store tests against on-disk files

use downtime::tables::{entity_table, ENTITY_TABLE};
use downtime::{RelationalStore, SqliteStore, Value, WriteMode};
use downtime_synth::{EntityRecord, Schema};
use chrono::NaiveDate;
use tempfile::TempDir;
use uuid::Uuid;

fn records(day: u32, count: u128) -> Vec<EntityRecord> {
    let date = NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
    (0..count)
        .map(|i| {
            let mut r = EntityRecord::new(Uuid::from_u128(u128::from(day) * 1000 + i), date);
            r.distance = Some(i as f64);
            r
        })
        .collect()
}

#[test]
fn test_tables_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gen.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        let table = entity_table(&Schema::base(), &records(1, 3));
        store.write_table(ENTITY_TABLE, &table, WriteMode::Replace).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert!(store.table_exists(ENTITY_TABLE).unwrap());
    assert_eq!(store.row_count(ENTITY_TABLE).unwrap(), 3);
}

#[test]
fn test_replace_changes_columns() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("gen.db")).unwrap();

    store
        .write_table(ENTITY_TABLE, &entity_table(&Schema::base(), &records(1, 2)), WriteMode::Replace)
        .unwrap();
    store
        .write_table(ENTITY_TABLE, &entity_table(&Schema::full(), &records(1, 2)), WriteMode::Replace)
        .unwrap();
    store
        .write_table(ENTITY_TABLE, &entity_table(&Schema::full(), &records(2, 4)), WriteMode::Append)
        .unwrap();

    let table = store.read_table(ENTITY_TABLE).unwrap();
    assert_eq!(table.columns.len(), 8);
    assert_eq!(table.len(), 6);
    let eccentricity = table.column_index("eccentricity").unwrap();
    assert!(table.rows.iter().all(|row| row[eccentricity].is_null()));
}

#[test]
fn test_append_with_missing_column_fails() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("gen.db")).unwrap();
    store
        .write_table(ENTITY_TABLE, &entity_table(&Schema::base(), &records(1, 1)), WriteMode::Replace)
        .unwrap();

    let wider = entity_table(&Schema::full(), &records(2, 1));
    assert!(store.write_table(ENTITY_TABLE, &wider, WriteMode::Append).is_err());
    // The failed append rolled back
    assert_eq!(store.row_count(ENTITY_TABLE).unwrap(), 1);
}

#[test]
fn test_execute_group_by_date() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("gen.db")).unwrap();
    let mut all = records(1, 2);
    all.extend(records(3, 5));
    store
        .write_table(ENTITY_TABLE, &entity_table(&Schema::base(), &all), WriteMode::Replace)
        .unwrap();

    let rows = store
        .execute("SELECT date_added, COUNT(*) FROM EXOPLANETS GROUP BY date_added ORDER BY date_added")
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Text("2020-01-01".to_string()), Value::Integer(2)],
            vec![Value::Text("2020-01-03".to_string()), Value::Integer(5)],
        ]
    );
}

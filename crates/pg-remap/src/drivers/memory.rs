//! In-memory [`TextStore`] for deterministic tests and dry experiments.
//!
//! Tables are keyed by a single `id bigint` column. A column declared with a
//! maximum length rejects longer writes the way a `varchar(n)` column does.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::core::schema::{ColumnDescriptor, KeyColumn, RowKey, SchemaSnapshot, StoredRow};
use crate::core::traits::{RowFilter, TextStore};
use crate::error::{RemapError, Result};

const KEY_COLUMN: &str = "id";
const KEY_TYPE: &str = "bigint";

#[derive(Debug, Clone)]
struct MemoryColumn {
    max_length: Option<usize>,
    read_only: bool,
    generated: bool,
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: BTreeMap<String, MemoryColumn>,
    /// id -> column -> value. A missing entry is NULL.
    rows: BTreeMap<i64, BTreeMap<String, String>>,
}

/// Text store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, MemoryTable>>,
    writes: AtomicU64,
    scans: AtomicU64,
}

fn lock_with_recovery<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a text column, creating its table if needed. `max_length`
    /// of `None` declares an unbounded `text` column.
    pub fn add_column(&self, table: &str, column: &str, max_length: Option<usize>) {
        lock_with_recovery(&self.tables)
            .entry(table.to_string())
            .or_default()
            .columns
            .insert(
                column.to_string(),
                MemoryColumn {
                    max_length,
                    read_only: false,
                    generated: false,
                },
            );
    }

    /// Flag a column the way a `<table>_<column>_readonly` trigger does.
    pub fn mark_readonly(&self, table: &str, column: &str) {
        let mut tables = lock_with_recovery(&self.tables);
        if let Some(col) = tables
            .get_mut(table)
            .and_then(|t| t.columns.get_mut(column))
        {
            col.read_only = true;
        }
    }

    /// Turn a column into a generated one. Generated columns hold values
    /// but are left out of the snapshot, as the server cannot update them.
    pub fn mark_generated(&self, table: &str, column: &str) {
        let mut tables = lock_with_recovery(&self.tables);
        if let Some(col) = tables
            .get_mut(table)
            .and_then(|t| t.columns.get_mut(column))
        {
            col.generated = true;
        }
    }

    /// Insert or replace row `id`. Columns not listed are NULL.
    pub fn insert(&self, table: &str, id: i64, values: &[(&str, &str)]) {
        let mut tables = lock_with_recovery(&self.tables);
        let table = tables.entry(table.to_string()).or_default();
        let row = values
            .iter()
            .map(|(c, v)| (c.to_string(), v.to_string()))
            .collect();
        table.rows.insert(id, row);
    }

    /// Current value of one cell; `None` for NULL or a missing row.
    pub fn get(&self, table: &str, id: i64, column: &str) -> Option<String> {
        lock_with_recovery(&self.tables)
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .and_then(|r| r.get(column))
            .cloned()
    }

    /// Number of successful single-row writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Number of column scans so far.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Acquire)
    }
}

/// The row id a key addresses. A key of any other shape addresses no row,
/// like an `UPDATE` whose `WHERE` clause matches nothing.
fn parse_key(key: &RowKey) -> Option<i64> {
    match key.parts.as_slice() {
        [part] if part.column == KEY_COLUMN => part.value.parse().ok(),
        _ => None,
    }
}

fn missing_table(column: &ColumnDescriptor) -> RemapError {
    RemapError::SchemaIntrospection(format!("table {} does not exist", column.table))
}

#[async_trait]
impl TextStore for MemoryStore {
    async fn snapshot(&self, schema: &str) -> Result<SchemaSnapshot> {
        let tables = lock_with_recovery(&self.tables);
        let columns = tables
            .iter()
            .flat_map(|(table, t)| {
                t.columns
                    .iter()
                    .filter(|(_, col)| !col.generated)
                    .map(move |(name, col)| ColumnDescriptor {
                        schema: schema.to_string(),
                        table: table.clone(),
                        name: name.clone(),
                        data_type: match col.max_length {
                            Some(_) => "character varying".to_string(),
                            None => "text".to_string(),
                        },
                        max_length: col.max_length,
                        read_only: col.read_only,
                        key_columns: vec![KeyColumn::new(KEY_COLUMN, KEY_TYPE)],
                    })
            })
            .collect();
        Ok(SchemaSnapshot::new(schema, columns))
    }

    async fn scan_column<'a>(
        &'a self,
        column: &'a ColumnDescriptor,
        filter: &'a dyn RowFilter,
    ) -> Result<BoxStream<'a, Result<StoredRow>>> {
        self.scans.fetch_add(1, Ordering::Release);
        let tables = lock_with_recovery(&self.tables);
        let table = tables.get(&column.table).ok_or_else(|| missing_table(column))?;

        // Matching rows are copied out so the lock is released before the
        // caller writes back.
        let rows: Vec<StoredRow> = table
            .rows
            .iter()
            .filter_map(|(id, row)| row.get(&column.name).map(|v| (id, v)))
            .filter(|(_, v)| filter.prefilter().map_or(true, |p| v.contains(p)))
            .filter(|(_, v)| filter.is_match(v))
            .map(|(id, v)| StoredRow {
                key: RowKey::single(KEY_COLUMN, id.to_string()),
                value: v.clone(),
            })
            .collect();
        drop(tables);

        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn write_value(
        &self,
        column: &ColumnDescriptor,
        key: &RowKey,
        value: &str,
    ) -> Result<u64> {
        let mut tables = lock_with_recovery(&self.tables);
        let table = tables
            .get_mut(&column.table)
            .ok_or_else(|| missing_table(column))?;

        if let Some(max_length) = table.columns.get(&column.name).and_then(|c| c.max_length) {
            let actual_length = value.chars().count();
            if actual_length > max_length {
                return Err(RemapError::ColumnLengthViolation {
                    table: column.table.clone(),
                    column: column.name.clone(),
                    key: key.to_string(),
                    max_length,
                    actual_length,
                });
            }
        }

        match parse_key(key).and_then(|id| table.rows.get_mut(&id)) {
            Some(row) => {
                row.insert(column.name.clone(), value.to_string());
                self.writes.fetch_add(1, Ordering::Release);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

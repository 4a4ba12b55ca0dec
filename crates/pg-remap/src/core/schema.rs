//! Schema and row metadata types.
//!
//! A [`SchemaSnapshot`] is taken fresh from the store at the start of every
//! invocation and dropped at the end of it. Nothing here is cached.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix of the trigger a schema migration installs to freeze a column.
pub const READONLY_TRIGGER_SUFFIX: &str = "_readonly";

/// Name of the trigger that marks `table.column` as read-only.
pub fn readonly_trigger_name(table: &str, column: &str) -> String {
    format!("{}_{}{}", table, column, READONLY_TRIGGER_SUFFIX)
}

/// Primary key column of a table, with its SQL type as rendered by
/// `format_type` (e.g. "integer", "character varying(50)").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub sql_type: String,
}

impl KeyColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// A text-bearing column that a remap may target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub table: String,

    /// Column name.
    pub name: String,

    /// Data type (e.g., "text", "character varying").
    pub data_type: String,

    /// Declared maximum length in characters. `None` means unbounded.
    pub max_length: Option<usize>,

    /// Marked read-only by a prior migration; never written.
    pub read_only: bool,

    /// Primary key of the owning table. Empty when the table has none,
    /// in which case rows are addressed by physical row id.
    pub key_columns: Vec<KeyColumn>,
}

impl ColumnDescriptor {
    /// `table.column`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }

    /// Whether rows of this column are addressed by `ctid` instead of a key.
    pub fn uses_row_id(&self) -> bool {
        self.key_columns.is_empty()
    }

    /// Check a candidate value against the declared length.
    ///
    /// Returns the offending character count when the value does not fit.
    pub fn check_length(&self, value: &str) -> Option<(usize, usize)> {
        let max = self.max_length?;
        let len = value.chars().count();
        if len > max {
            Some((max, len))
        } else {
            None
        }
    }
}

/// Text columns of one schema, as introspected for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub schema: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl SchemaSnapshot {
    pub fn new(schema: impl Into<String>, mut columns: Vec<ColumnDescriptor>) -> Self {
        columns.sort_by(|a, b| (&a.table, &a.name).cmp(&(&b.table, &b.name)));
        Self {
            schema: schema.into(),
            columns,
        }
    }

    /// Columns a remap may write: not in an excluded table, not read-only.
    pub fn eligible<'a>(
        &'a self,
        excluded_tables: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a ColumnDescriptor> + 'a {
        self.columns
            .iter()
            .filter(move |c| !excluded_tables.contains(&c.table) && !c.read_only)
    }

    /// Distinct table names, sorted.
    pub fn tables(&self) -> BTreeSet<&str> {
        self.columns.iter().map(|c| c.table.as_str()).collect()
    }
}

/// One component of a row key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPart {
    pub column: String,
    pub value: String,
}

/// Identifies one row: primary key values in key order, or `ctid`.
///
/// Values are carried as text and cast back to the key column's type
/// when the row is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowKey {
    pub parts: Vec<KeyPart>,
}

impl RowKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    /// Single-column key.
    pub fn single(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parts: vec![KeyPart {
                column: column.into(),
                value: value.into(),
            }],
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", part.column, part.value)?;
        }
        Ok(())
    }
}

/// A row read during a scan: its key and the column's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub key: RowKey,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(
        table: &str,
        name: &str,
        max_length: Option<usize>,
        read_only: bool,
    ) -> ColumnDescriptor {
        ColumnDescriptor {
            schema: "public".to_string(),
            table: table.to_string(),
            name: name.to_string(),
            data_type: "character varying".to_string(),
            max_length,
            read_only,
            key_columns: vec![KeyColumn::new("id", "integer")],
        }
    }

    #[test]
    fn test_readonly_trigger_name() {
        assert_eq!(readonly_trigger_name("posts", "cooked"), "posts_cooked_readonly");
    }

    #[test]
    fn test_check_length_counts_characters() {
        let col = column("bookmarks", "name", Some(5), false);
        assert_eq!(col.check_length("héllo"), None);
        assert_eq!(col.check_length("héllo!"), Some((5, 6)));

        let unbounded = column("posts", "raw", None, false);
        assert_eq!(unbounded.check_length(&"a".repeat(10_000)), None);
    }

    #[test]
    fn test_snapshot_sorted_and_filtered() {
        let snapshot = SchemaSnapshot::new(
            "public",
            vec![
                column("posts", "raw", None, false),
                column("badges", "query", None, false),
                column("posts", "cooked", None, true),
                column("users", "name", Some(60), false),
            ],
        );

        let names: Vec<String> = snapshot.columns.iter().map(|c| c.full_name()).collect();
        assert_eq!(names, vec!["badges.query", "posts.cooked", "posts.raw", "users.name"]);

        let excluded: BTreeSet<String> = ["users".to_string()].into_iter().collect();
        let eligible: Vec<String> = snapshot.eligible(&excluded).map(|c| c.full_name()).collect();
        assert_eq!(eligible, vec!["badges.query", "posts.raw"]);

        assert_eq!(
            snapshot.tables().into_iter().collect::<Vec<_>>(),
            vec!["badges", "posts", "users"]
        );
    }

    #[test]
    fn test_row_key_display() {
        assert_eq!(RowKey::single("id", "42").to_string(), "id=42");

        let composite = RowKey::new(vec![
            KeyPart {
                column: "topic_id".to_string(),
                value: "1".to_string(),
            },
            KeyPart {
                column: "user_id".to_string(),
                value: "2".to_string(),
            },
        ]);
        assert_eq!(composite.to_string(), "topic_id=1, user_id=2");
    }

    #[test]
    fn test_uses_row_id() {
        let mut col = column("logs", "message", None, false);
        assert!(!col.uses_row_id());
        col.key_columns.clear();
        assert!(col.uses_row_id());
    }
}

//! Core traits for store-agnostic remapping.
//!
//! - [`TextStore`]: schema introspection, row scanning, and single-row writes
//! - [`RowFilter`]: decides which scanned values are candidates
//!
//! The remapper drives a `TextStore` one column and one row at a time.
//! Implementations must not wrap writes in a shared transaction: every
//! [`TextStore::write_value`] call stands on its own.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

use super::schema::{ColumnDescriptor, RowKey, SchemaSnapshot, StoredRow};

/// Selects candidate rows during a scan.
pub trait RowFilter: Send + Sync {
    /// Literal substring every candidate must contain. Stores may push this
    /// down to the server to avoid shipping non-matching rows.
    fn prefilter(&self) -> Option<&str>;

    /// Whether a value is a candidate.
    fn is_match(&self, value: &str) -> bool;
}

/// A store of text columns that can be introspected and rewritten row by row.
#[async_trait]
pub trait TextStore: Send + Sync {
    /// Introspect every text-like column of the base tables in `schema`,
    /// including read-only ones (flagged, not dropped).
    ///
    /// Called once per invocation; the result is never cached.
    async fn snapshot(&self, schema: &str) -> Result<SchemaSnapshot>;

    /// Stream the non-null rows of `column` whose value `filter` accepts.
    ///
    /// Rows arrive in key order where the table has a key. The stream may
    /// hold a connection of its own until it is dropped, so
    /// [`TextStore::write_value`] can run while it is still open.
    async fn scan_column<'a>(
        &'a self,
        column: &'a ColumnDescriptor,
        filter: &'a dyn RowFilter,
    ) -> Result<BoxStream<'a, Result<StoredRow>>>;

    /// Write `value` into `column` for the row identified by `key`.
    ///
    /// Returns the number of rows affected. A value exceeding the column's
    /// declared length must fail with `RemapError::ColumnLengthViolation`.
    async fn write_value(
        &self,
        column: &ColumnDescriptor,
        key: &RowKey,
        value: &str,
    ) -> Result<u64>;

    /// Store type identifier for logging (e.g. "postgres", "memory").
    fn store_type(&self) -> &'static str;
}

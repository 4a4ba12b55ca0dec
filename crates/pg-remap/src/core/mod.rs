//! Core abstractions for store-agnostic remapping.
//!
//! - [`schema`]: column, key, and snapshot metadata types
//! - [`identifier`]: identifier validation and quoting for generated SQL
//! - [`traits`]: the [`TextStore`] seam implemented by drivers
//!
//! The remapper only talks to a [`TextStore`]; drivers under `drivers/`
//! supply the PostgreSQL and in-memory implementations.

pub mod identifier;
pub mod schema;
pub mod traits;

pub use schema::{
    readonly_trigger_name, ColumnDescriptor, KeyColumn, KeyPart, RowKey, SchemaSnapshot,
    StoredRow,
};
pub use traits::{RowFilter, TextStore};

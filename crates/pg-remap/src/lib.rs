//! # pg-remap
//!
//! Bulk find/replace across every text column of a PostgreSQL schema.
//!
//! This library rewrites stored text in place, for example when a site moves
//! to a new domain and every link baked into posts, bios and settings has to
//! follow:
//!
//! - **Literal remaps** with optional left/right anchoring
//! - **Regex remaps** with `\1`-style capture references and `g`/`i` flags
//! - **Length-aware writes** that stop at, or skip, values too long for their column
//! - **Dry runs** and **find** for previewing what would change
//!
//! Read-only columns (marked by a `<table>_<column>_readonly` trigger) and
//! excluded tables are never written. Writes are not transactional.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pg_remap::{Config, PostgresStore, RemapOptions, Remapper};
//!
//! #[tokio::main]
//! async fn main() -> pg_remap::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let store = PostgresStore::connect(&config.database).await?;
//!     let remapper = Remapper::new(Arc::new(store), &config.database.schema);
//!
//!     let options = RemapOptions::from_defaults(&config.remap).exclude_table("drafts");
//!     let report = remapper
//!         .remap("http://old.example.com", "https://example.com", &options)
//!         .await?;
//!     println!("Updated {} rows", report.rows_updated());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod remap;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, RemapDefaults};
pub use crate::core::{
    ColumnDescriptor, RowFilter, RowKey, SchemaSnapshot, StoredRow, TextStore,
};
pub use drivers::{HealthCheckResult, MemoryStore, PostgresStore};
pub use error::{RemapError, Result};
pub use remap::{
    ColumnSummary, FindMatch, OutcomeStatus, RemapOptions, RemapOutcome, RemapReport,
    RemapRequest, Remapper, Rewrite, RowPlan,
};

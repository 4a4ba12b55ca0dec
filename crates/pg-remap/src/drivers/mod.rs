//! Store implementations of [`TextStore`](crate::core::TextStore).
//!
//! - [`postgres`]: PostgreSQL via deadpool-postgres
//! - [`memory`]: in-memory tables for tests
//! - [`common`]: shared helpers (TLS)

pub mod common;
pub mod memory;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use memory::MemoryStore;
pub use postgres::{HealthCheckResult, PostgresStore};

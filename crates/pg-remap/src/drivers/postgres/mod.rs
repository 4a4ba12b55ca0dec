//! PostgreSQL driver.
//!
//! - [`PostgresStore`]: pooled [`TextStore`](crate::core::TextStore) over one schema
//! - SQL text for introspection, scans and single-row updates

mod sql;
mod store;

pub use store::{HealthCheckResult, PostgresStore};

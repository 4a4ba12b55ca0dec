//! Helpers shared by the store drivers.
//!
//! - [`tls`]: rustls connector for the PostgreSQL pool

pub mod tls;

pub use tls::{SslMode, TlsBuilder};

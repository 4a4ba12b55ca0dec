//! Error types for the remapping library.

use thiserror::Error;

/// Exit codes used by the CLI, one per error family.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_DATABASE_ERROR: u8 = 2;
pub const EXIT_POOL_ERROR: u8 = 3;
pub const EXIT_SCHEMA_ERROR: u8 = 4;
pub const EXIT_PATTERN_ERROR: u8 = 5;
pub const EXIT_LENGTH_VIOLATION: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;
pub const EXIT_SERIALIZATION_ERROR: u8 = 8;

/// Main error type for remap operations.
#[derive(Error, Debug)]
pub enum RemapError {
    /// Configuration error (invalid YAML, missing fields, bad arguments)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or statement error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Schema introspection failed; raised before any row is written
    #[error("Schema introspection failed: {0}")]
    SchemaIntrospection(String),

    /// Malformed or empty search pattern; raised before any row is scanned
    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Replacement value does not fit the column's declared length
    #[error(
        "value too long for column (table: {table}, column: {column}, key: {key}, \
         max length: {max_length}, got: {actual_length})"
    )]
    ColumnLengthViolation {
        table: String,
        column: String,
        key: String,
        max_length: usize,
        actual_length: usize,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemapError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        RemapError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an InvalidPattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl ToString) -> Self {
        RemapError::InvalidPattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error is a per-row length violation.
    pub fn is_length_violation(&self) -> bool {
        matches!(self, RemapError::ColumnLengthViolation { .. })
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            RemapError::Config(_) | RemapError::Yaml(_) => EXIT_CONFIG_ERROR,
            RemapError::Database(_) => EXIT_DATABASE_ERROR,
            RemapError::Pool { .. } => EXIT_POOL_ERROR,
            RemapError::SchemaIntrospection(_) => EXIT_SCHEMA_ERROR,
            RemapError::InvalidPattern { .. } => EXIT_PATTERN_ERROR,
            RemapError::ColumnLengthViolation { .. } => EXIT_LENGTH_VIOLATION,
            RemapError::Io(_) => EXIT_IO_ERROR,
            RemapError::Json(_) => EXIT_SERIALIZATION_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for remap operations.
pub type Result<T> = std::result::Result<T, RemapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_violation_message_names_table_and_column() {
        let err = RemapError::ColumnLengthViolation {
            table: "bookmarks".to_string(),
            column: "name".to_string(),
            key: "id=1".to_string(),
            max_length: 100,
            actual_length: 101,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("value too long"));
        assert!(msg.contains("table: bookmarks,"));
        assert!(msg.contains("column: name"));
        assert!(err.is_length_violation());
        assert_eq!(err.exit_code(), EXIT_LENGTH_VIOLATION);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RemapError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            RemapError::invalid_pattern("[", "unclosed").exit_code(),
            EXIT_PATTERN_ERROR
        );
        assert_eq!(
            RemapError::pool("timeout", "checkout").exit_code(),
            EXIT_POOL_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(RemapError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml");
        let err = RemapError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
        assert!(detailed.contains("Caused by:"));
    }
}

//! Configuration validation.

use super::Config;
use crate::drivers::common::SslMode;
use crate::error::{RemapError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;

    if db.host.is_empty() {
        return Err(RemapError::Config("database.host is required".into()));
    }
    if db.database.is_empty() {
        return Err(RemapError::Config("database.database is required".into()));
    }
    if db.user.is_empty() {
        return Err(RemapError::Config("database.user is required".into()));
    }
    if db.schema.is_empty() {
        return Err(RemapError::Config("database.schema cannot be empty".into()));
    }

    SslMode::parse(&db.ssl_mode)?;

    // Scan and update run on separate connections.
    if db.max_connections < 2 {
        return Err(RemapError::Config(format!(
            "database.max_connections must be at least 2, got {}",
            db.max_connections
        )));
    }

    if let Some(table) = config.remap.excluded_tables.iter().find(|t| t.is_empty()) {
        return Err(RemapError::Config(format!(
            "remap.excluded_tables contains an empty table name: {:?}",
            table
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, RemapDefaults};

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "forum".to_string(),
                user: "forum".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
                max_connections: 4,
            },
            remap: RemapDefaults::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.database.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_user() {
        let mut config = valid_config();
        config.database.user = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.database.ssl_mode = "sometimes".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("ssl_mode"));
    }

    #[test]
    fn test_single_connection_rejected() {
        let mut config = valid_config();
        config.database.max_connections = 1;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }

    #[test]
    fn test_empty_excluded_table_rejected() {
        let mut config = valid_config();
        config.remap.excluded_tables.insert(String::new());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_database_config_debug_redacts_password() {
        let mut config = valid_config();
        config.database.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.database);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_password_not_serialized() {
        let mut config = valid_config();
        config.database.password = "super_secret".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("super_secret"), "Password was serialized: {}", json);
    }
}

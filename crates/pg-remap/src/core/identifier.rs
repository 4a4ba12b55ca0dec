//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as statement parameters, only
//! values can. Every identifier that ends up in generated SQL goes through
//! [`quote_pg`], which rejects null bytes and over-long names and escapes
//! embedded double quotes.

use crate::error::{RemapError, Result};

/// PostgreSQL truncates identifiers at 63 bytes.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RemapError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(RemapError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(RemapError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Validate a type name taken from `format_type` before splicing it into a
/// `CAST(.. AS <type>)`.
///
/// Catalog type names only contain identifier characters, spaces, dots,
/// quotes, commas, parentheses, and brackets.
pub fn validate_type_name(sql_type: &str) -> Result<()> {
    let ok = !sql_type.is_empty()
        && sql_type.chars().all(|c| {
            c.is_alphanumeric() || matches!(c, '_' | ' ' | '.' | '"' | ',' | '(' | ')' | '[' | ']')
        })
        && !sql_type.contains("--");

    if ok {
        Ok(())
    } else {
        Err(RemapError::SchemaIntrospection(format!(
            "SECURITY: unexpected characters in key column type {:?}",
            sql_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("my_table").is_ok());
        assert!(validate_identifier("column with spaces").is_ok());
        assert!(validate_identifier("日本語").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_rejects_too_long() {
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let result = validate_identifier(&long_name);
        assert!(result.unwrap_err().to_string().contains("maximum length"));
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("table\"name").unwrap(), "\"table\"\"name\"");
        assert_eq!(
            quote_pg("x\"; DROP TABLE users; --").unwrap(),
            "\"x\"\"; DROP TABLE users; --\""
        );
    }

    #[test]
    fn test_qualify_pg() {
        assert_eq!(qualify_pg("public", "posts").unwrap(), "\"public\".\"posts\"");
        assert!(qualify_pg("", "posts").is_err());
        assert!(qualify_pg("public", "").is_err());
    }

    #[test]
    fn test_validate_type_name() {
        assert!(validate_type_name("integer").is_ok());
        assert!(validate_type_name("character varying(50)").is_ok());
        assert!(validate_type_name("numeric(10,2)").is_ok());
        assert!(validate_type_name("timestamp without time zone").is_ok());
        assert!(validate_type_name("integer[]").is_ok());
        assert!(validate_type_name("public.\"Custom\"").is_ok());

        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("int); DROP TABLE x").is_err());
        assert!(validate_type_name("int -- x").is_err());
    }
}

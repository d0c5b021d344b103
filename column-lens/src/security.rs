//! SQL identifier hardening for generated profiling queries.
//!
//! Every table and column name that reaches a generated query passes through
//! [`SqlSecurity`]. Identifiers are always emitted double-quoted, so warehouse
//! names with spaces, mixed case or hyphens are accepted, while anything that
//! could terminate a statement or open a comment is rejected outright.

use crate::error::{ProfileError, Result};

/// Maximum accepted identifier length, in bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and escapes a SQL identifier (table name, column name, etc.).
    ///
    /// # Examples
    /// ```rust
    /// use column_lens::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("customer_id").unwrap(), "\"customer_id\"");
    /// assert_eq!(SqlSecurity::escape_identifier("Order Date").unwrap(), "\"Order Date\"");
    /// assert!(SqlSecurity::escape_identifier("id; DROP TABLE users--").is_err());
    /// assert!(SqlSecurity::escape_identifier(&"very_long_name_".repeat(100)).is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;

        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates a SQL identifier without escaping it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(ProfileError::invalid_descriptor(
                "identifier cannot be empty or whitespace-only",
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ProfileError::invalid_descriptor(format!(
                "identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.chars().any(char::is_control) {
            return Err(ProfileError::invalid_descriptor(
                "identifier cannot contain control characters",
            ));
        }

        Self::check_dangerous_patterns(identifier)
    }

    /// Escapes a value for use inside a single-quoted SQL string literal.
    pub fn escape_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn check_dangerous_patterns(identifier: &str) -> Result<()> {
        const DANGEROUS: &[&str] = &[";", "--", "/*", "*/"];

        for pattern in DANGEROUS {
            if identifier.contains(pattern) {
                return Err(ProfileError::invalid_descriptor(format!(
                    "identifier '{identifier}' contains forbidden sequence '{pattern}'"
                )));
            }
        }

        Ok(())
    }
}

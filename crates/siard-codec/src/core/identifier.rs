//! Identifier validation and quoting for generated extraction queries.
//!
//! Table and column names from the catalog end up inside `SELECT` text and
//! cannot be bound as parameters, so they are validated and quoted here. The
//! optional `where`/`order_by` fragments are checked for statement-splitting
//! patterns before they are appended.

use crate::error::{CodecError, Result};

/// Maximum identifier length accepted before quoting.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding [`MAX_IDENTIFIER_LENGTH`].
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CodecError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(CodecError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(CodecError::Config(format!(
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

/// Qualify a PostgreSQL table name with its schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Validate a `WHERE` or `ORDER BY` fragment taken from the catalog.
///
/// Rejects semicolons and SQL comment markers.
pub fn validate_fragment(fragment: &str) -> Result<()> {
    if fragment.contains(';') {
        return Err(CodecError::Config(format!(
            "SECURITY: Query fragment contains semicolon (possible injection): {:?}",
            fragment
        )));
    }
    if fragment.contains("--") || fragment.contains("/*") || fragment.contains("*/") {
        return Err(CodecError::Config(format!(
            "SECURITY: Query fragment contains SQL comment markers (possible injection): {:?}",
            fragment
        )));
    }
    Ok(())
}

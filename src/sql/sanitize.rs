//! SQL Identifier Utilities
//!
//! Identifiers come from schema declarations, never from callers. Quoting
//! only guards against collisions with keywords such as `order` or `user`.

use std::sync::OnceLock;

use regex::Regex;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Quote a SQL identifier
///
/// # Example
/// ```
/// use runtara_repository::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("order"), "\"order\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Quote a column reference, optionally qualified with its table
pub fn quote_column(qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(table) => format!("{}.{}", quote_identifier(table), quote_identifier(column)),
        None => quote_identifier(column),
    }
}

/// Validate a table or column name declared in a schema
///
/// # Example
/// ```
/// use runtara_repository::sql::validate_identifier;
///
/// assert!(validate_identifier("created_at").is_ok());
/// assert!(validate_identifier("my-table").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if !identifier_pattern().is_match(name) {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a letter or underscore and contain only letters, numbers, and underscores.",
            name
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // quote_identifier Tests
    // =========================================================================

    #[test]
    fn test_quote_identifier_simple() {
        assert_eq!(quote_identifier("my_table"), "\"my_table\"");
        assert_eq!(quote_identifier("users"), "\"users\"");
    }

    #[test]
    fn test_quote_identifier_with_quotes() {
        assert_eq!(
            quote_identifier("table\"with\"quotes"),
            "\"table\"\"with\"\"quotes\""
        );
    }

    #[test]
    fn test_quote_identifier_reserved_keyword() {
        assert_eq!(quote_identifier("select"), "\"select\"");
        assert_eq!(quote_identifier("user"), "\"user\"");
    }

    #[test]
    fn test_quote_column_qualified() {
        assert_eq!(quote_column(Some("users"), "email"), "\"users\".\"email\"");
        assert_eq!(quote_column(None, "email"), "\"email\"");
    }

    // =========================================================================
    // validate_identifier Tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("products").is_ok());
        assert!(validate_identifier("my_table_123").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("CamelCase").is_ok());
    }

    #[test]
    fn test_validate_identifier_reserved_words_allowed() {
        // Quoting makes keywords safe as column names
        assert!(validate_identifier("order").is_ok());
        assert!(validate_identifier("user").is_ok());
    }

    #[test]
    fn test_validate_identifier_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().contains("cannot be empty"));
    }

    #[test]
    fn test_validate_identifier_invalid_chars() {
        assert!(validate_identifier("1products").is_err());
        assert!(validate_identifier("my-table").is_err());
        assert!(validate_identifier("schema.table").is_err());
        assert!(validate_identifier("my table").is_err());
        assert!(validate_identifier("a\"b").is_err());
        assert!(validate_identifier("x;drop").is_err());
    }
}

//! Identifier validation, quoting and name derivation.
//!
//! SQL identifiers (table names, column names, schema names) cannot be passed
//! as parameters in prepared statements, so any identifier spliced into
//! generated SQL goes through [`validate_identifier`] and a vendor quoting
//! function first.
//!
//! The second half of this module derives identifier-safe names for schema
//! elements: Pascal-case type names for tables and camel-case member names for
//! columns. [`IdentifierMap`] keeps both directions of the mapping and makes
//! derived names unique within one schema.

use std::collections::HashMap;

use crate::error::{BindError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - SQL Server: 128 characters
/// - MySQL: 64 characters
/// - Oracle: 128 bytes (12.2+)
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Words that cannot be used as a bare member name.
const RESERVED_WORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `BindError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BindError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(BindError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BindError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier with ANSI double quotes (SQLite, H2, Oracle, PostgreSQL).
///
/// Escapes double quotes by doubling them.
pub fn quote_ansi(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier using backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a SQL Server identifier using brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Split a database name into words.
///
/// Any non-alphanumeric character separates words, as does a lower-case to
/// upper-case transition (`orderLine` is two words).
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let all_upper = !word.chars().any(char::is_lowercase);
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let rest: String = chars.collect();
            let rest = if all_upper { rest.to_lowercase() } else { rest };
            first.to_uppercase().chain(rest.chars()).collect()
        }
    }
}

/// Derive a Pascal-case type name from a database identifier.
///
/// `order_line` → `OrderLine`, `ORDER_LINE` → `OrderLine`, `2fa codes` → `_2faCodes`.
pub fn make_pascal_case_identifier(name: &str) -> String {
    let joined: String = split_words(name).iter().map(|w| capitalize(w)).collect();
    if joined.is_empty() {
        return "_".to_string();
    }
    if joined.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("_{}", joined);
    }
    if joined == "Self" {
        return "Self_".to_string();
    }
    joined
}

/// Derive a camel-case member name from a database identifier.
///
/// `CUSTOMER_ID` → `customerId`, `type` → `type_`.
pub fn make_camel_case_identifier(name: &str) -> String {
    let pascal = make_pascal_case_identifier(name);
    if pascal.starts_with('_') {
        return pascal;
    }
    let mut chars = pascal.chars();
    let camel: String = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => pascal,
    };
    if RESERVED_WORDS.contains(&camel.as_str()) {
        format!("{}_", camel)
    } else {
        camel
    }
}

/// Bidirectional map between native database names and derived identifiers.
///
/// Derived names are unique within the map: a collision appends `2`, `3`, ...
/// in insertion order, so the result is deterministic for a given order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMap {
    to_identifier: HashMap<String, String>,
    to_original: HashMap<String, String>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `original` and return its derived identifier.
    ///
    /// Registering the same original twice returns the existing identifier.
    pub fn insert_with(&mut self, original: &str, derive: fn(&str) -> String) -> String {
        if let Some(existing) = self.to_identifier.get(original) {
            return existing.clone();
        }

        let base = derive(original);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.to_original.contains_key(&candidate) {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }

        self.to_identifier
            .insert(original.to_string(), candidate.clone());
        self.to_original
            .insert(candidate.clone(), original.to_string());
        candidate
    }

    /// Register a table name, deriving a Pascal-case identifier.
    pub fn insert(&mut self, original: &str) -> String {
        self.insert_with(original, make_pascal_case_identifier)
    }

    pub fn identifier(&self, original: &str) -> Option<&str> {
        self.to_identifier.get(original).map(String::as_str)
    }

    pub fn original(&self, identifier: &str) -> Option<&str> {
        self.to_original.get(identifier).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.to_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_identifier.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("column with spaces").is_ok());
        assert!(validate_identifier("日本語").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_rejects_too_long() {
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let result = validate_identifier(&long_name);
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    // =========================================================================
    // Quoting tests
    // =========================================================================

    #[test]
    fn test_quote_ansi_escapes_double_quote() {
        assert_eq!(quote_ansi("users").unwrap(), "\"users\"");
        assert_eq!(quote_ansi("table\"name").unwrap(), "\"table\"\"name\"");
    }

    #[test]
    fn test_quote_mysql_escapes_backtick() {
        assert_eq!(quote_mysql("table`name").unwrap(), "`table``name`");
    }

    #[test]
    fn test_quote_mssql_sql_injection_safely_quoted() {
        let result = quote_mssql("Robert]; DROP TABLE Students;--");
        assert_eq!(result.unwrap(), "[Robert]]; DROP TABLE Students;--]");
    }

    // =========================================================================
    // Name derivation tests
    // =========================================================================

    #[test]
    fn test_pascal_case() {
        assert_eq!(make_pascal_case_identifier("order_line"), "OrderLine");
        assert_eq!(make_pascal_case_identifier("ORDER_LINE"), "OrderLine");
        assert_eq!(make_pascal_case_identifier("orderLine"), "OrderLine");
        assert_eq!(make_pascal_case_identifier("order line-item"), "OrderLineItem");
        assert_eq!(make_pascal_case_identifier("Person"), "Person");
    }

    #[test]
    fn test_pascal_case_leading_digit_and_empty() {
        assert_eq!(make_pascal_case_identifier("2fa codes"), "_2faCodes");
        assert_eq!(make_pascal_case_identifier("$$"), "_");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(make_camel_case_identifier("CUSTOMER_ID"), "customerId");
        assert_eq!(make_camel_case_identifier("id"), "id");
        assert_eq!(make_camel_case_identifier("type"), "type_");
        assert_eq!(make_camel_case_identifier("Match"), "match_");
    }

    #[test]
    fn test_identifier_map_collisions() {
        let mut map = IdentifierMap::new();
        assert_eq!(map.insert("order_line"), "OrderLine");
        assert_eq!(map.insert("ORDER_LINE"), "OrderLine2");
        assert_eq!(map.insert("OrderLine"), "OrderLine3");
        // re-insert is stable
        assert_eq!(map.insert("ORDER_LINE"), "OrderLine2");

        assert_eq!(map.original("OrderLine2"), Some("ORDER_LINE"));
        assert_eq!(map.identifier("order_line"), Some("OrderLine"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_identifier_map_deterministic() {
        let names = ["a_b", "A_B", "ab", "x"];
        let build = || {
            let mut m = IdentifierMap::new();
            for n in names {
                m.insert(n);
            }
            m
        };
        assert_eq!(build(), build());
    }
}

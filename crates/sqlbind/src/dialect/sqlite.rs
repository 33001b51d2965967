//! SQLite column type normalization.
//!
//! SQLite stores a column's declared type as free text and reports it in
//! `TYPE_NAME`; the code its metadata reports in `DATA_TYPE` only reflects
//! the storage affinity. The declared name is the better source, so it is
//! mapped through a fixed table after stripping any `(length, scale)`
//! qualifier.

use crate::core::jdbc;
use crate::core::traits::MetaRow;

use super::TypeNormalizer;

const PRODUCT_NAME: &str = "sqlite";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTypeMapping;

impl SqliteTypeMapping {
    /// Canonical code for a declared type name, e.g. `VARCHAR(40)` → `VARCHAR`.
    ///
    /// Matching is exact after normalization: `INTERVAL` does not match `INT`.
    pub fn map_type_name(type_name: &str) -> Option<i32> {
        let base = base_type(type_name);
        let code = match base.as_str() {
            "BOOLEAN" => jdbc::BOOLEAN,
            "TINYINT" => jdbc::TINYINT,
            "SMALLINT" | "INT2" => jdbc::SMALLINT,
            "BIGINT" | "INT8" | "UNSIGNED BIG INT" => jdbc::BIGINT,
            "DATE" | "DATETIME" => jdbc::DATE,
            "TIMESTAMP" => jdbc::TIMESTAMP,
            "INT" | "INTEGER" | "MEDIUMINT" => jdbc::INTEGER,
            "DECIMAL" => jdbc::DECIMAL,
            "DOUBLE" | "DOUBLE PRECISION" => jdbc::DOUBLE,
            "NUMERIC" => jdbc::NUMERIC,
            "REAL" => jdbc::REAL,
            "FLOAT" => jdbc::FLOAT,
            "CHARACTER" | "NCHAR" | "NATIVE CHARACTER" | "CHAR" => jdbc::CHAR,
            "CLOB" => jdbc::CLOB,
            "VARCHAR" | "VARYING CHARACTER" | "NVARCHAR" | "TEXT" => jdbc::VARCHAR,
            "BINARY" => jdbc::BINARY,
            "BLOB" => jdbc::BLOB,
            _ => return None,
        };
        Some(code)
    }
}

/// Text before the first `(`, trimmed and upper-cased.
fn base_type(type_name: &str) -> String {
    type_name
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
}

impl TypeNormalizer for SqliteTypeMapping {
    fn product_name(&self) -> &str {
        PRODUCT_NAME
    }

    fn jdbc_type(&self, product_name: &str, row: &MetaRow) -> Option<i32> {
        if !product_name.eq_ignore_ascii_case(PRODUCT_NAME) {
            return None;
        }
        Self::map_type_name(&row.type_name)
    }
}

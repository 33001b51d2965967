//! Vendor-specific behavior, selected by a [`Vendor`] enumeration.
//!
//! Everything that differs between database products is looked up here
//! instead of string-matching the product name at the call site:
//!
//! - column type normalization ([`TypeNormalizer`], [`SqliteTypeMapping`])
//! - the extra script separator (`GO` for SQL Server, `/` for Oracle)
//! - error offset resolution for diagnostics (H2 caret markers)
//! - identifier quoting and parameter placeholders
//! - DDL failures tolerated while bootstrapping (Oracle `DROP USER`)

mod sqlite;

pub use sqlite::SqliteTypeMapping;

use std::fmt;

use crate::core::identifier::{quote_ansi, quote_mssql, quote_mysql};
use crate::core::traits::MetaRow;
use crate::error::{BindError, Result};
use crate::script::ExtraSeparator;

/// Database products with vendor-specific handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    H2,
    Oracle,
    Sqlite,
    SqlServer,
    MySql,
    Postgres,
    Other,
}

impl Vendor {
    /// Classify a product name as reported by a driver
    /// (e.g. `Microsoft SQL Server`, `SQLite`, `H2`).
    pub fn from_product_name(product_name: &str) -> Self {
        let name = product_name.trim().to_ascii_lowercase();
        if name == "h2" {
            Vendor::H2
        } else if name.contains("oracle") {
            Vendor::Oracle
        } else if name.contains("sqlite") {
            Vendor::Sqlite
        } else if name.contains("sql server") || name == "mssql" {
            Vendor::SqlServer
        } else if name.contains("mysql") || name.contains("mariadb") {
            Vendor::MySql
        } else if name.contains("postgres") {
            Vendor::Postgres
        } else {
            Vendor::Other
        }
    }

    /// Separator recognized in scripts in addition to `;`.
    pub fn extra_separator(self) -> Option<ExtraSeparator> {
        match self {
            Vendor::SqlServer => Some(ExtraSeparator::Go),
            Vendor::Oracle => Some(ExtraSeparator::Slash),
            _ => None,
        }
    }

    /// Column type normalizer for this vendor, if its driver needs one.
    pub fn type_normalizer(self) -> Option<&'static dyn TypeNormalizer> {
        static SQLITE: SqliteTypeMapping = SqliteTypeMapping;
        match self {
            Vendor::Sqlite => Some(&SQLITE),
            _ => None,
        }
    }

    /// Character offset into the query text that `error` points at, or 0
    /// when the vendor's messages carry no position.
    ///
    /// H2 messages embed the failing query in double quotes with a `[*]`
    /// marker at the error position, and spell line breaks as a literal
    /// `\000a`. This is a best-effort parse of that text.
    pub fn find_offset(self, error: &BindError, query_is_crlf: bool) -> usize {
        match self {
            Vendor::H2 => match error {
                BindError::Sql { .. } | BindError::Script { .. } => {
                    find_offset_h2(&error.driver_message(), query_is_crlf)
                }
                _ => 0,
            },
            _ => 0,
        }
    }

    /// Quote an identifier for this vendor.
    pub fn quote_ident(self, name: &str) -> Result<String> {
        match self {
            Vendor::MySql => quote_mysql(name),
            Vendor::SqlServer => quote_mssql(name),
            _ => quote_ansi(name),
        }
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn param_placeholder(self, index: usize) -> String {
        match self {
            Vendor::SqlServer => format!("@P{}", index),
            Vendor::Postgres => format!("${}", index),
            _ => "?".to_string(),
        }
    }

    /// Whether a failed DDL statement may be skipped while running an
    /// initialization script. Oracle fails `DROP USER` for a user that does
    /// not exist yet, which is the normal case on a fresh database.
    pub fn tolerates_ddl_failure(self, statement: &str) -> bool {
        match self {
            Vendor::Oracle => statement.to_ascii_lowercase().contains("drop user "),
            _ => false,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Vendor::H2 => "H2",
            Vendor::Oracle => "Oracle",
            Vendor::Sqlite => "SQLite",
            Vendor::SqlServer => "SQL Server",
            Vendor::MySql => "MySQL",
            Vendor::Postgres => "PostgreSQL",
            Vendor::Other => "other",
        };
        f.write_str(name)
    }
}

fn find_offset_h2(message: &str, query_is_crlf: bool) -> usize {
    let msg = message.replace("\\000a", if query_is_crlf { "\r\n" } else { "\n" });

    let Some(quote) = msg.find('"') else {
        return 0;
    };
    let Some(marker) = msg.find("[*]") else {
        return 0;
    };

    let start = msg[..quote].chars().count() + 1;
    let marker = msg[..marker].chars().count();
    marker.saturating_sub(start)
}

/// Resolves the canonical JDBC type of a column whose vendor-reported code
/// is unreliable.
pub trait TypeNormalizer: Send + Sync {
    /// Product name this normalizer applies to (compared case-insensitively).
    fn product_name(&self) -> &str;

    /// Canonical type code for `row`, or `None` for no opinion (unknown
    /// product or unrecognized type name). Callers fall back to the
    /// vendor-reported code.
    fn jdbc_type(&self, product_name: &str, row: &MetaRow) -> Option<i32>;
}

//! Core abstractions shared by every other module.
//!
//! - [`jdbc`]: canonical JDBC type codes
//! - [`value`]: runtime SQL values and their coercions
//! - [`identifier`]: identifier quoting and Pascal/camel-case name derivation
//! - [`traits`]: connection, driver and row-cursor contracts
//! - [`catalog`]: driver registry acting as the connection provider
//!
//! Driver modules (`drivers/sqlite`, `drivers/mysql`, `drivers/mssql`)
//! implement these traits; everything above them only sees the traits.

pub mod catalog;
pub mod identifier;
pub mod jdbc;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use catalog::DriverCatalog;
pub use identifier::IdentifierMap;
pub use traits::{
    BaseElement, Connection, ConnectionNotifier, ConnectionProvider, Driver, ImportedKeyRow,
    MetaRow, ResultColumn, ResultRow, ResultSet, RowCursor, TableKind, TableRow,
};
pub use value::SqlValue;

//! Database driver implementations.
//!
//! Each driver implements [`Driver`](crate::core::traits::Driver) and hands
//! out [`Connection`](crate::core::traits::Connection)s:
//!
//! - [`sqlite`]: SQLite via SQLx (feature `sqlite`, on by default)
//! - [`mysql`]: MySQL/MariaDB via SQLx (feature `mysql`)
//! - [`mssql`]: Microsoft SQL Server via Tiberius (feature `mssql`)
//! - [`common`]: helpers shared by the drivers
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` (e.g., `drivers/postgres/`)
//! 2. Implement `Driver` and `Connection`
//! 3. Register the driver in `DriverCatalog::with_builtins()`
//! 4. Gate the driver with a feature flag in `Cargo.toml`

pub mod common;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

#[cfg(feature = "mysql")]
pub use mysql::MysqlDriver;

#[cfg(feature = "mssql")]
pub use mssql::MssqlDriver;

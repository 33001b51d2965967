//! # sqlbind
//!
//! Schema discovery and type binding for compile-time checked SQL.
//!
//! This library reads a database's schema and decides, for every column and
//! parameter, which Rust type represents it and how values move in and out:
//!
//! - **Configuration** from `.dbconfig` (JSON) or YAML files, with
//!   `${var}` and `#resource(...)` URL expressions
//! - **Schema discovery** of tables, views, columns and keys, with foreign
//!   keys resolved into a navigable graph
//! - **Type normalization** for drivers that report unreliable type codes
//!   (SQLite)
//! - **Value accessors** mapping each JDBC type code to a target type and
//!   its read/write strategy
//! - **SQL scripts** split per vendor and run atomically, once per DDL
//!   resource
//! - **Diagnostics** positioned in the query text where the vendor allows
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlbind::{BindContext, DbConfig, DriverCatalog, FsResourceLocator, Mode, SchemaBuilder};
//!
//! #[tokio::main]
//! async fn main() -> sqlbind::Result<()> {
//!     let resources = FsResourceLocator::new().with_compile_root("src/main/resources");
//!     let ctx = BindContext::new(Arc::new(resources));
//!     let config = DbConfig::load("src/main/resources/Sales.dbconfig", Mode::CompileTime, &ctx)?;
//!
//!     let builder = SchemaBuilder::new(Arc::new(DriverCatalog::with_builtins()), ctx);
//!     let schema = builder.build(&config).await?;
//!     for table in schema.tables() {
//!         println!("{} -> {}", table.name, table.identifier);
//!     }
//!     Ok(())
//! }
//! ```

pub mod accessor;
pub mod config;
pub mod context;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod issues;
pub mod query;
pub mod resource;
pub mod schema;
pub mod script;
pub mod typemap;

// Re-exports for convenient access
pub use accessor::{TargetType, ValueAccessor, ValueAccessorProvider};
pub use config::{DbConfig, DbConfigSet, DbSettings, Mode};
pub use context::BindContext;
pub use crate::core::{Connection, ConnectionProvider, DriverCatalog, SqlValue};
pub use dialect::{SqliteTypeMapping, TypeNormalizer, Vendor};
pub use error::{BindError, Result};
pub use issues::{Issue, IssueContainer, IssueKind, QueryScope};
pub use query::Query;
pub use resource::{FsResourceLocator, MemoryResourceLocator, ResourceLocator};
pub use schema::{Schema, SchemaBuilder, SchemaCache};
pub use script::{DdlRegistry, SqlScriptParser, SqlScriptRunner};
pub use typemap::TypeMap;

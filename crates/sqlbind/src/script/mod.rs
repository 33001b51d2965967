//! SQL script splitting and execution.
//!
//! - [`SqlScriptParser`]: splits script text into commands
//! - [`SqlScriptRunner`]: runs them in batch or tolerant mode
//! - [`DdlRegistry`]: runs each DDL resource at most once

mod ddl;
mod parser;
mod runner;

pub use ddl::DdlRegistry;
pub use parser::{ExtraSeparator, SqlScriptParser};
pub use runner::{FailureHandler, SqlScriptRunner};

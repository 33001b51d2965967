//! Microsoft SQL Server driver.
//!
//! Built on Tiberius. Accepts JDBC-style URLs:
//!
//! ```text
//! jdbc:sqlserver://localhost:1433;databaseName=sales;trustServerCertificate=true
//! ```
//!
//! A configured user and password are used for SQL Server authentication
//! and override any given in the URL.

mod connection;

pub use connection::MssqlSession;

use async_trait::async_trait;
use tracing::info;

use crate::core::traits::{Connection, Driver};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDriver;

impl MssqlDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for MssqlDriver {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn accepts(&self, url: &str) -> bool {
        url.starts_with("sqlserver:")
    }

    async fn connect(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn Connection>> {
        let session = MssqlSession::open(url, user, password).await?;
        info!("Connected to MSSQL: {}", url);
        Ok(Box::new(session))
    }
}

//! SQLite driver.
//!
//! Built on SQLx. Accepts URLs in SQLx form, with or without a `jdbc:` prefix:
//!
//! ```text
//! sqlite::memory:
//! sqlite:path/to/app.db
//! jdbc:sqlite:/abs/path/app.db
//! ```
//!
//! Database files are created when missing. User and password are ignored.

mod connection;

pub use connection::SqliteSession;

use async_trait::async_trait;
use tracing::debug;

use crate::core::traits::{Connection, Driver};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn accepts(&self, url: &str) -> bool {
        url.starts_with("sqlite:")
    }

    async fn connect(
        &self,
        url: &str,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> Result<Box<dyn Connection>> {
        let session = SqliteSession::open(url).await?;
        debug!("Opened SQLite connection to {}", url);
        Ok(Box::new(session))
    }
}

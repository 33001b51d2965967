//! Driver catalog for explicit dependency injection.
//!
//! The [`DriverCatalog`] is a registry of connection drivers. It is explicitly
//! constructed and handed to the schema builder as its [`ConnectionProvider`],
//! rather than discovered through global service lookup.
//!
//! Drivers compiled in through Cargo features are registered by
//! [`DriverCatalog::with_builtins`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::DbConfig;
use crate::error::{BindError, Result};

use super::traits::{Connection, ConnectionProvider, Driver};

/// Strip the `jdbc:` prefix carried by URLs written for JDBC tooling.
pub fn strip_jdbc_prefix(url: &str) -> &str {
    url.strip_prefix("jdbc:").unwrap_or(url)
}

/// Registry of connection drivers.
///
/// # Example
///
/// ```rust,ignore
/// let catalog = DriverCatalog::with_builtins();
/// let mut conn = catalog.connection(&config).await?;
/// ```
#[derive(Default)]
pub struct DriverCatalog {
    /// Registered drivers, in registration order.
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with every driver compiled into this build.
    pub fn with_builtins() -> Self {
        #[allow(unused_mut)]
        let mut catalog = Self::new();

        #[cfg(feature = "sqlite")]
        catalog.register_driver(crate::drivers::SqliteDriver::new());

        #[cfg(feature = "mysql")]
        catalog.register_driver(crate::drivers::MysqlDriver::new());

        #[cfg(feature = "mssql")]
        catalog.register_driver(crate::drivers::MssqlDriver::new());

        catalog
    }

    /// Register a driver. A driver with the same name is replaced.
    pub fn register_driver(&mut self, driver: impl Driver + 'static) {
        self.register_driver_arc(Arc::new(driver));
    }

    /// Register a driver as an Arc (for sharing).
    pub fn register_driver_arc(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.retain(|d| d.name() != driver.name());
        self.drivers.push(driver);
    }

    /// Get a driver by name.
    pub fn get_driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Get a driver by name, returning an error if not found.
    pub fn require_driver(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.get_driver(name).ok_or_else(|| {
            BindError::Driver(format!(
                "{} (compiled drivers: {})",
                name,
                self.driver_names().join(", ")
            ))
        })
    }

    /// Check if a driver is registered.
    pub fn has_driver(&self, name: &str) -> bool {
        self.get_driver(name).is_some()
    }

    /// First registered driver accepting `url`.
    pub fn driver_for_url(&self, url: &str) -> Option<Arc<dyn Driver>> {
        let url = strip_jdbc_prefix(url);
        self.drivers.iter().find(|d| d.accepts(url)).cloned()
    }

    /// Get all registered driver names.
    pub fn driver_names(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.name()).collect()
    }
}

#[async_trait]
impl ConnectionProvider for DriverCatalog {
    async fn connection(&self, config: &DbConfig) -> Result<Box<dyn Connection>> {
        let url = config.effective_url().ok_or_else(|| {
            BindError::Config(format!("No url configured for dbconfig '{}'", config.name()))
        })?;

        let driver = match config.driver() {
            Some(name) => self.require_driver(name)?,
            None => self.driver_for_url(url).ok_or_else(|| {
                BindError::Driver(format!("no registered driver accepts url {}", url))
            })?,
        };

        debug!("Connecting to {} with driver {}", url, driver.name());
        let mut conn = driver
            .connect(strip_jdbc_prefix(url), config.user(), config.password())
            .await
            .map_err(|e| BindError::connection(url, e.driver_message()))?;

        if let Err(e) = config
            .init(conn.as_mut(), url, config.schema_name(), config.db_ddl())
            .await
        {
            if let Err(close_err) = conn.close().await {
                warn!("Failed to close connection to {}: {}", url, close_err);
            }
            return Err(e);
        }

        Ok(conn)
    }

    fn load_driver(&self, name: &str) -> Result<()> {
        self.require_driver(name).map(|_| ())
    }
}

//! Built schemas, keyed by configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::DbConfig;
use crate::error::Result;

use super::{Schema, SchemaBuilder};

/// Builds each distinct [`DbConfig`]'s schema at most once.
///
/// The lock is held across the build, so concurrent requests for the same
/// config wait for the first build instead of racing it. A failed build is
/// not cached and the next request retries.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: Mutex<HashMap<DbConfig, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build(
        &self,
        builder: &SchemaBuilder,
        config: &DbConfig,
    ) -> Result<Arc<Schema>> {
        let mut schemas = self.schemas.lock().await;
        if let Some(schema) = schemas.get(config) {
            debug!("Schema cache hit for dbconfig '{}'", config.name());
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(builder.build(config).await?);
        schemas.insert(config.clone(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Cached schema for `config`, without building.
    pub async fn get(&self, config: &DbConfig) -> Option<Arc<Schema>> {
        self.schemas.lock().await.get(config).cloned()
    }

    pub async fn len(&self) -> usize {
        self.schemas.lock().await.len()
    }

    pub async fn clear(&self) {
        self.schemas.lock().await.clear();
    }
}

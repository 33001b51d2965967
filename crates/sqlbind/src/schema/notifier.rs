use async_trait::async_trait;
use tracing::debug;

use crate::core::traits::{Connection, ConnectionNotifier};
use crate::dialect::Vendor;
use crate::error::Result;

/// Turns on foreign key enforcement for SQLite connections, which start
/// with it disabled. Other vendors are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteForeignKeys;

#[async_trait]
impl ConnectionNotifier for SqliteForeignKeys {
    fn name(&self) -> &str {
        "sqlite-foreign-keys"
    }

    async fn notify(&self, conn: &mut dyn Connection) -> Result<()> {
        if conn.vendor() == Vendor::Sqlite {
            debug!("Enabling foreign keys on {}", conn.url());
            conn.execute("PRAGMA foreign_keys = ON").await?;
        }
        Ok(())
    }
}

//! Schema discovery over a live connection.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::context::BindContext;
use crate::core::identifier::{make_camel_case_identifier, IdentifierMap};
use crate::core::traits::{Connection, ConnectionProvider, ImportedKeyRow, MetaRow, TableKind};
use crate::error::{BindError, Result};

use super::{resolve_foreign_keys, Column, ForeignKey, Schema, Table, TableId};

/// Builds a [`Schema`] from the database a [`DbConfig`] points at.
pub struct SchemaBuilder {
    provider: Arc<dyn ConnectionProvider>,
    context: BindContext,
}

impl SchemaBuilder {
    pub fn new(provider: Arc<dyn ConnectionProvider>, context: BindContext) -> Self {
        Self { provider, context }
    }

    pub fn context(&self) -> &BindContext {
        &self.context
    }

    /// Connect, read every table and view of the effective schema, and
    /// resolve foreign keys. The connection is closed on every path.
    pub async fn build(&self, config: &DbConfig) -> Result<Schema> {
        if let Some(driver) = config.driver() {
            self.provider.load_driver(driver)?;
        }

        let url = config.effective_url().unwrap_or_default().to_string();
        let mut conn = self.provider.connection(config).await.map_err(|e| {
            BindError::SchemaDiscovery(format!(
                "Failed to connect to {}: {}",
                url,
                e.format_detailed()
            ))
        })?;

        let result = self.build_with(conn.as_mut(), config).await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close schema connection to {}: {}", url, e);
        }

        result.map_err(|e| match e {
            BindError::SchemaDiscovery(_) | BindError::Driver(_) => e,
            other => BindError::SchemaDiscovery(format!(
                "Failed to read schema from {}: {}",
                url,
                other.format_detailed()
            )),
        })
    }

    async fn build_with(&self, conn: &mut dyn Connection, config: &DbConfig) -> Result<Schema> {
        for notifier in self.context.notifiers() {
            debug!("Running connection notifier {}", notifier.name());
            notifier.notify(conn).await?;
        }

        let schemas = conn.schemas().await?;
        let schema_name = find_schema_name(config, &schemas);
        debug!("Schemas reported: {:?}, using {:?}", schemas, schema_name);

        let vendor = conn.vendor();
        let table_rows = conn.tables(schema_name.as_deref()).await?;

        let mut tables = Vec::with_capacity(table_rows.len());
        let mut by_name = HashMap::with_capacity(table_rows.len());
        let mut identifiers = IdentifierMap::new();

        for row in table_rows {
            let id = TableId(tables.len());
            let mut table = Table {
                id,
                identifier: identifiers.insert(&row.name),
                name: row.name,
                kind: row.kind,
                columns: Vec::new(),
                primary_key: Vec::new(),
                foreign_keys: Vec::new(),
                referenced_by: Vec::new(),
            };

            self.load_columns(conn, schema_name.as_deref(), &mut table)
                .await?;
            if table.kind == TableKind::Table {
                self.load_primary_key(conn, schema_name.as_deref(), &mut table)
                    .await?;
                self.load_foreign_keys(conn, schema_name.as_deref(), &mut table)
                    .await?;
            }

            by_name.insert(table.name.clone(), id);
            tables.push(table);
        }

        resolve_foreign_keys(&mut tables, &by_name);

        let name = schema_name.unwrap_or_default();
        info!(
            "Extracted {} tables from schema '{}' for dbconfig '{}'",
            tables.len(),
            name,
            config.name()
        );

        Ok(Schema {
            name,
            config: config.clone(),
            vendor,
            tables,
            by_name,
            identifiers,
        })
    }

    async fn load_columns(
        &self,
        conn: &mut dyn Connection,
        schema: Option<&str>,
        table: &mut Table,
    ) -> Result<()> {
        let rows = conn.columns(schema, &table.name).await?;
        let normalizer = conn.vendor().type_normalizer();
        let product = conn.product_name().to_string();
        let mut identifiers = IdentifierMap::new();

        for row in rows {
            let jdbc_type = normalizer
                .and_then(|n| n.jdbc_type(&product, &row))
                .unwrap_or(row.data_type);
            table.columns.push(make_column(table.id, row, jdbc_type, &mut identifiers));
        }
        table.columns.sort_by_key(|c| c.position);

        debug!("Loaded {} columns for {}", table.columns.len(), table.name);
        Ok(())
    }

    async fn load_primary_key(
        &self,
        conn: &mut dyn Connection,
        schema: Option<&str>,
        table: &mut Table,
    ) -> Result<()> {
        table.primary_key = conn.primary_keys(schema, &table.name).await?;
        for column in &mut table.columns {
            column.is_primary_key = table.primary_key.contains(&column.name);
        }

        debug!("Primary key for {}: {:?}", table.name, table.primary_key);
        Ok(())
    }

    async fn load_foreign_keys(
        &self,
        conn: &mut dyn Connection,
        schema: Option<&str>,
        table: &mut Table,
    ) -> Result<()> {
        let rows = conn.imported_keys(schema, &table.name).await?;
        table.foreign_keys = group_foreign_keys(rows);

        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            table.name
        );
        Ok(())
    }
}

fn make_column(
    table: TableId,
    row: MetaRow,
    jdbc_type: i32,
    identifiers: &mut IdentifierMap,
) -> Column {
    Column {
        identifier: identifiers.insert_with(&row.column_name, make_camel_case_identifier),
        name: row.column_name,
        position: row.ordinal_position,
        jdbc_type,
        type_name: row.type_name,
        nullable: row.nullable,
        size: row.column_size,
        decimal_digits: row.decimal_digits,
        is_autoincrement: row.is_autoincrement,
        is_primary_key: false,
        table,
        key_ref: None,
    }
}

/// Effective schema for `config` among the schemas the database reports.
///
/// A configured schema name wins. Otherwise the schema named like the
/// config (ignoring case), then the last schema that is not
/// `information_schema`, then the first reported one.
fn find_schema_name(config: &DbConfig, schemas: &[String]) -> Option<String> {
    if let Some(name) = config.schema_name().filter(|s| !s.is_empty()) {
        return Some(name.to_string());
    }

    schemas
        .iter()
        .find(|s| s.eq_ignore_ascii_case(config.name()))
        .or_else(|| {
            schemas
                .iter()
                .rev()
                .find(|s| !s.eq_ignore_ascii_case("information_schema"))
        })
        .or_else(|| schemas.first())
        .cloned()
}

/// Group imported-key rows into foreign keys. A new key starts at key
/// sequence 1 or when the constraint name changes.
fn group_foreign_keys(rows: Vec<ImportedKeyRow>) -> Vec<ForeignKey> {
    let mut keys: Vec<ForeignKey> = Vec::new();

    for row in rows {
        let continues = match keys.last() {
            Some(current) => {
                row.key_seq > 1 && current.name == row.fk_name && current.ref_table == row.pk_table
            }
            None => false,
        };

        if !continues {
            keys.push(ForeignKey {
                name: row.fk_name.clone(),
                columns: Vec::new(),
                ref_table: row.pk_table.clone(),
                ref_columns: Vec::new(),
                target: None,
            });
        }

        if let Some(current) = keys.last_mut() {
            current.columns.push(row.fk_column);
            if let Some(pk_column) = row.pk_column {
                current.ref_columns.push(pk_column);
            }
        }
    }

    keys
}

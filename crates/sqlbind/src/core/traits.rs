//! Core traits for database-agnostic schema discovery and query execution.
//!
//! - [`Connection`]: one open database session (metadata, statements, transactions)
//! - [`Driver`]: opens connections for the URLs it accepts
//! - [`ConnectionProvider`]: hands out initialized connections for a [`DbConfig`]
//! - [`ConnectionNotifier`]: vendor session setup run on each schema-build connection
//! - [`BaseElement`]: column metadata consulted by value accessors
//! - [`RowCursor`]: positional read access to one result row
//!
//! The metadata methods on [`Connection`] mirror the JDBC `DatabaseMetaData`
//! calls (`getSchemas`, `getTables`, `getColumns`, `getPrimaryKeys`,
//! `getImportedKeys`) and return plain row structs.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::DbConfig;
use crate::dialect::Vendor;
use crate::error::{BindError, Result};

use super::value::SqlValue;

/// Kind of a discovered relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Table,
    View,
}

impl TableKind {
    /// JDBC `TABLE_TYPE` label.
    pub fn label(self) -> &'static str {
        match self {
            TableKind::Table => "TABLE",
            TableKind::View => "VIEW",
        }
    }
}

/// One row of a table listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub schema: Option<String>,
    pub name: String,
    pub kind: TableKind,
}

/// One row of column metadata, as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRow {
    pub table_name: String,
    pub column_name: String,
    /// Vendor-reported JDBC type code (`DATA_TYPE`).
    pub data_type: i32,
    /// Vendor type name (`TYPE_NAME`), e.g. `VARCHAR(40)` on SQLite.
    pub type_name: String,
    pub column_size: i32,
    pub decimal_digits: i32,
    pub nullable: bool,
    /// 1-based.
    pub ordinal_position: usize,
    pub is_autoincrement: bool,
}

/// One row of imported (foreign) key metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedKeyRow {
    /// Constraint name, when the vendor reports one.
    pub fk_name: Option<String>,
    pub fk_column: String,
    pub pk_table: String,
    /// Referenced column; `None` means the referenced table's primary key.
    pub pk_column: Option<String>,
    /// 1-based position within a composite key.
    pub key_seq: usize,
}

/// Column metadata consulted by value accessors.
pub trait BaseElement {
    fn name(&self) -> &str;

    /// 1-based position in the row.
    fn position(&self) -> usize;

    /// Canonical JDBC type code.
    fn jdbc_type(&self) -> i32;

    fn type_name(&self) -> &str;

    fn is_nullable(&self) -> bool;

    fn size(&self) -> i32 {
        0
    }

    fn decimal_digits(&self) -> i32 {
        0
    }
}

/// A column of a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub position: usize,
    pub jdbc_type: i32,
    pub type_name: String,
    pub nullable: bool,
}

impl BaseElement for ResultColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> usize {
        self.position
    }

    fn jdbc_type(&self) -> i32 {
        self.jdbc_type
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Positional read access to one row.
///
/// Only [`get_object`](RowCursor::get_object) is required; the typed getters
/// coerce the raw storage value the way a JDBC `ResultSet` getter would.
pub trait RowCursor {
    /// Raw value at the 1-based `position`.
    fn get_object(&self, position: usize) -> Result<SqlValue>;

    fn get_bool(&self, position: usize) -> Result<Option<bool>> {
        self.get_object(position)?.to_bool()
    }

    fn get_i16(&self, position: usize) -> Result<Option<i16>> {
        self.get_object(position)?.to_i16()
    }

    fn get_i32(&self, position: usize) -> Result<Option<i32>> {
        self.get_object(position)?.to_i32()
    }

    fn get_i64(&self, position: usize) -> Result<Option<i64>> {
        self.get_object(position)?.to_i64()
    }

    fn get_f32(&self, position: usize) -> Result<Option<f32>> {
        self.get_object(position)?.to_f32()
    }

    fn get_f64(&self, position: usize) -> Result<Option<f64>> {
        self.get_object(position)?.to_f64()
    }

    fn get_decimal(&self, position: usize) -> Result<Option<Decimal>> {
        self.get_object(position)?.to_decimal()
    }

    fn get_string(&self, position: usize) -> Result<Option<String>> {
        self.get_object(position)?.to_text()
    }

    fn get_bytes(&self, position: usize) -> Result<Option<Vec<u8>>> {
        self.get_object(position)?.to_bytes()
    }

    fn get_date(&self, position: usize) -> Result<Option<NaiveDate>> {
        self.get_object(position)?.to_date()
    }

    fn get_time(&self, position: usize) -> Result<Option<NaiveTime>> {
        self.get_object(position)?.to_time()
    }

    fn get_datetime(&self, position: usize) -> Result<Option<NaiveDateTime>> {
        self.get_object(position)?.to_datetime()
    }

    fn get_datetime_offset(&self, position: usize) -> Result<Option<DateTime<FixedOffset>>> {
        self.get_object(position)?.to_datetime_offset()
    }

    fn get_uuid(&self, position: usize) -> Result<Option<Uuid>> {
        self.get_object(position)?.to_uuid()
    }
}

/// Raw values of one result row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub values: Vec<SqlValue>,
}

impl RowCursor for ResultRow {
    fn get_object(&self, position: usize) -> Result<SqlValue> {
        position
            .checked_sub(1)
            .and_then(|i| self.values.get(i))
            .cloned()
            .ok_or_else(|| {
                BindError::Value(format!(
                    "column position {} out of range (row has {} columns)",
                    position,
                    self.values.len()
                ))
            })
    }
}

/// A fully materialized query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<ResultRow>,
}

/// One open database session.
///
/// Auto-commit starts enabled. Turning it off opens an implicit transaction
/// that lasts until [`commit`](Connection::commit) or
/// [`rollback`](Connection::rollback).
#[async_trait]
pub trait Connection: Send {
    /// Database product name as reported by the server (e.g. `SQLite`).
    fn product_name(&self) -> &str;

    fn vendor(&self) -> Vendor {
        Vendor::from_product_name(self.product_name())
    }

    /// URL this connection was opened with.
    fn url(&self) -> &str;

    fn auto_commit(&self) -> bool;

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Select the default schema for unqualified names.
    async fn set_schema(&mut self, schema: &str) -> Result<()>;

    /// Execute one statement, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Execute statements in order, stopping at the first failure.
    async fn execute_batch(&mut self, statements: &[String]) -> Result<Vec<u64>> {
        let mut counts = Vec::with_capacity(statements.len());
        for sql in statements {
            counts.push(self.execute(sql).await?);
        }
        Ok(counts)
    }

    /// Run a query with positional parameters.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet>;

    async fn schemas(&mut self) -> Result<Vec<String>>;

    /// Tables and views of `schema`, ordered by name.
    async fn tables(&mut self, schema: Option<&str>) -> Result<Vec<TableRow>>;

    /// Columns of `table`, ordered by position.
    async fn columns(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<MetaRow>>;

    /// Primary key column names of `table`, in key order.
    async fn primary_keys(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>>;

    async fn imported_keys(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ImportedKeyRow>>;

    /// Release the session. Further calls fail; dropping a connection also closes it.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections for the URLs it accepts.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Name used in `DbConfig.driver` (e.g. `sqlite`).
    fn name(&self) -> &'static str;

    /// Whether this driver handles `url` (after any `jdbc:` prefix is stripped).
    fn accepts(&self, url: &str) -> bool;

    async fn connect(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn Connection>>;
}

/// Hands out initialized connections for a configuration.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Open a connection and run [`DbConfig::init`] on it.
    async fn connection(&self, config: &DbConfig) -> Result<Box<dyn Connection>>;

    /// Verify that the named driver is available.
    fn load_driver(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// Session setup hook run once on each new schema-build connection.
#[async_trait]
pub trait ConnectionNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, conn: &mut dyn Connection) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_row() -> ResultRow {
        ResultRow {
            values: vec![
                SqlValue::I64(1),
                SqlValue::Text("2024-01-02".to_string()),
                SqlValue::Null,
            ],
        }
    }

    #[test]
    fn test_row_cursor_is_one_based() {
        let row = make_test_row();
        assert_eq!(row.get_object(1).unwrap(), SqlValue::I64(1));
        assert!(row.get_object(0).is_err());
        assert!(row.get_object(4).is_err());
    }

    #[test]
    fn test_typed_getters_coerce() {
        let row = make_test_row();
        assert_eq!(row.get_i32(1).unwrap(), Some(1));
        assert_eq!(row.get_bool(1).unwrap(), Some(true));
        assert_eq!(
            row.get_date(2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(row.get_string(3).unwrap(), None);
    }

    #[test]
    fn test_table_kind_label() {
        assert_eq!(TableKind::Table.label(), "TABLE");
        assert_eq!(TableKind::View.label(), "VIEW");
    }
}

//! SQLite session: statements, queries and catalog metadata.

use std::ffi::{CStr, CString};
use std::ptr;
use std::str::FromStr;

use async_trait::async_trait;
use libsqlite3_sys as ffi;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column, ConnectOptions, Connection as SqlxConnection, Executor, Row, Sqlite, Statement,
    TypeInfo, ValueRef,
};
use tracing::debug;

use crate::core::identifier::quote_ansi;
use crate::core::jdbc;
use crate::core::traits::{
    Connection, ImportedKeyRow, MetaRow, ResultColumn, ResultRow, ResultSet, TableKind, TableRow,
};
use crate::core::value::SqlValue;
use crate::dialect::SqliteTypeMapping;
use crate::drivers::common::{type_qualifier, TxState};
use crate::error::{BindError, Result};

const PRODUCT_NAME: &str = "SQLite";
const DEFAULT_SCHEMA: &str = "main";
const TEMP_SCHEMA: &str = "temp";

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// One SQLite connection.
pub struct SqliteSession {
    conn: Option<SqliteConnection>,
    url: String,
    schema: String,
    tx: TxState,
}

impl SqliteSession {
    pub async fn open(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let conn = options.connect().await?;
        Ok(Self {
            conn: Some(conn),
            url: url.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            tx: TxState::default(),
        })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| BindError::sql("connection is closed"))
    }

    async fn begin_if_needed(&mut self) -> Result<()> {
        if self.tx.needs_begin() {
            sqlx::query("BEGIN").execute(self.conn()?).await?;
            self.tx.opened();
        }
        Ok(())
    }

    async fn end_transaction(&mut self, statement: &str) -> Result<()> {
        if self.tx.is_open() {
            sqlx::query(statement).execute(self.conn()?).await?;
            self.tx.closed();
        }
        Ok(())
    }

    fn schema_or_default<'a>(&'a self, schema: Option<&'a str>) -> &'a str {
        schema.filter(|s| !s.is_empty()).unwrap_or(&self.schema)
    }

    async fn table_info(&mut self, schema: &str, table: &str) -> Result<Vec<TableInfoRow>> {
        let sql = format!(
            "PRAGMA {}.table_info({})",
            quote_ansi(schema)?,
            quote_ansi(table)?
        );
        let rows = sqlx::query(&sql).fetch_all(self.conn()?).await?;
        rows.iter()
            .map(|row| {
                Ok(TableInfoRow {
                    cid: row.try_get("cid")?,
                    name: row.try_get("name")?,
                    decl_type: row.try_get::<Option<String>, _>("type")?.unwrap_or_default(),
                    not_null: row.try_get::<i64, _>("notnull")? != 0,
                    pk: row.try_get("pk")?,
                })
            })
            .collect()
    }
}

/// One row of `PRAGMA table_info`.
struct TableInfoRow {
    cid: i64,
    name: String,
    decl_type: String,
    not_null: bool,
    /// 1-based position in the primary key, 0 when not part of it.
    pk: i64,
}

/// Type code for the column affinity SQLite derives from a declared type.
fn affinity_type(decl_type: &str) -> i32 {
    let decl = decl_type.to_ascii_uppercase();
    if decl.contains("INT") {
        jdbc::INTEGER
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        jdbc::VARCHAR
    } else if decl.contains("BLOB") || decl.trim().is_empty() {
        jdbc::BLOB
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        jdbc::REAL
    } else {
        jdbc::NUMERIC
    }
}

/// Type code of a result column.
///
/// A column read from a table carries its declared type, mapped the same way
/// schema discovery maps it. Expressions have none and fall back to the
/// storage class SQLx reports; SQLite integers are 64-bit.
fn result_column_type(decl_type: Option<&str>, storage: &str) -> i32 {
    if let Some(decl) = decl_type.filter(|d| !d.trim().is_empty()) {
        return SqliteTypeMapping::map_type_name(decl).unwrap_or_else(|| affinity_type(decl));
    }
    match storage {
        "INTEGER" => jdbc::BIGINT,
        "REAL" => jdbc::DOUBLE,
        "TIME" => jdbc::TIME,
        "DATETIME" => jdbc::TIMESTAMP,
        name => SqliteTypeMapping::map_type_name(name).unwrap_or(jdbc::OTHER),
    }
}

/// Declared types of the result columns of `sql`, `None` for expressions.
///
/// SQLx folds declared types into storage classes, so the statement is
/// prepared once more on the raw handle to read `sqlite3_column_decltype`.
async fn declared_types(conn: &mut SqliteConnection, sql: &str) -> Result<Vec<Option<String>>> {
    let text = CString::new(sql).map_err(|_| BindError::sql("SQL text contains a NUL byte"))?;
    let mut handle = conn.lock_handle().await?;
    let db = handle.as_raw_handle();

    // SAFETY: the handle lock keeps `db` valid and unshared for this block,
    // and the statement is finalized before the decltype strings are dropped.
    unsafe {
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = ffi::sqlite3_prepare_v2(db.as_ptr(), text.as_ptr(), -1, &mut stmt, ptr::null_mut());
        if rc != ffi::SQLITE_OK {
            let message = CStr::from_ptr(ffi::sqlite3_errmsg(db.as_ptr()))
                .to_string_lossy()
                .into_owned();
            ffi::sqlite3_finalize(stmt);
            return Err(BindError::sql(message));
        }

        let count = ffi::sqlite3_column_count(stmt);
        let types = (0..count)
            .map(|i| {
                let decl = ffi::sqlite3_column_decltype(stmt, i);
                (!decl.is_null()).then(|| CStr::from_ptr(decl).to_string_lossy().into_owned())
            })
            .collect();
        ffi::sqlite3_finalize(stmt);
        Ok(types)
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I16(v) => query.bind(*v),
        SqlValue::I32(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(v.to_string()),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeOffset(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(v.to_string()),
    }
}

/// Read a row by each value's storage class.
fn read_row(row: &SqliteRow) -> Result<ResultRow> {
    let mut values = Vec::with_capacity(row.len());
    for i in 0..row.len() {
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let storage = raw.type_info().name().to_string();
        let value = match storage.as_str() {
            "INTEGER" => SqlValue::I64(row.try_get_unchecked(i)?),
            "REAL" => SqlValue::F64(row.try_get_unchecked(i)?),
            "BLOB" => SqlValue::Bytes(row.try_get_unchecked(i)?),
            _ => SqlValue::Text(row.try_get_unchecked(i)?),
        };
        values.push(value);
    }
    Ok(ResultRow { values })
}

#[async_trait]
impl Connection for SqliteSession {
    fn product_name(&self) -> &str {
        PRODUCT_NAME
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn auto_commit(&self) -> bool {
        self.tx.auto_commit()
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit && !self.tx.auto_commit() {
            self.end_transaction("COMMIT").await?;
        }
        self.tx.set_auto_commit(auto_commit);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.end_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK").await
    }

    async fn set_schema(&mut self, schema: &str) -> Result<()> {
        let known = self.schemas().await?;
        if !known.iter().any(|s| s.eq_ignore_ascii_case(schema)) {
            return Err(BindError::sql(format!("unknown database: {}", schema)));
        }
        self.schema = schema.to_string();
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.begin_if_needed().await?;
        let done = sqlx::query(sql).execute(self.conn()?).await?;
        Ok(done.rows_affected())
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        self.begin_if_needed().await?;
        let conn = self.conn()?;

        let storage: Vec<(String, String)> = {
            let statement = (&mut *conn).prepare(sql).await?;
            statement
                .columns()
                .iter()
                .map(|col| (col.name().to_string(), col.type_info().name().to_string()))
                .collect()
        };
        let declared = declared_types(conn, sql).await?;

        let columns: Vec<ResultColumn> = storage
            .into_iter()
            .enumerate()
            .map(|(i, (name, storage))| {
                let decl = declared.get(i).cloned().flatten();
                ResultColumn {
                    name,
                    position: i + 1,
                    jdbc_type: result_column_type(decl.as_deref(), &storage),
                    type_name: decl.unwrap_or(storage),
                    nullable: true,
                }
            })
            .collect();

        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let rows = query.fetch_all(&mut *conn).await?;
        let rows = rows.iter().map(read_row).collect::<Result<Vec<_>>>()?;

        Ok(ResultSet { columns, rows })
    }

    async fn schemas(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query("PRAGMA database_list")
            .fetch_all(self.conn()?)
            .await?;
        // `temp` appears once a TEMP object exists; it never holds the
        // application schema.
        let names = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name").map_err(BindError::from))
            .collect::<Result<Vec<_>>>()?;
        Ok(names.into_iter().filter(|name| name != TEMP_SCHEMA).collect())
    }

    async fn tables(&mut self, schema: Option<&str>) -> Result<Vec<TableRow>> {
        let schema = self.schema_or_default(schema).to_string();
        let sql = format!(
            "SELECT name, type FROM {}.sqlite_master \
             WHERE type IN ('table', 'view') AND substr(name, 1, 7) <> 'sqlite_' \
             ORDER BY name",
            quote_ansi(&schema)?
        );
        let rows = sqlx::query(&sql).fetch_all(self.conn()?).await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("type")?;
                Ok(TableRow {
                    schema: Some(schema.clone()),
                    name: row.try_get("name")?,
                    kind: if kind == "view" {
                        TableKind::View
                    } else {
                        TableKind::Table
                    },
                })
            })
            .collect()
    }

    async fn columns(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<MetaRow>> {
        let schema = self.schema_or_default(schema).to_string();
        let info = self.table_info(&schema, table).await?;
        let pk_count = info.iter().filter(|c| c.pk > 0).count();

        let columns = info
            .into_iter()
            .map(|col| {
                let (column_size, decimal_digits) = type_qualifier(&col.decl_type);
                // A lone INTEGER PRIMARY KEY aliases the rowid.
                let is_autoincrement =
                    pk_count == 1 && col.pk > 0 && col.decl_type.eq_ignore_ascii_case("INTEGER");
                MetaRow {
                    table_name: table.to_string(),
                    column_name: col.name,
                    data_type: affinity_type(&col.decl_type),
                    type_name: col.decl_type,
                    column_size,
                    decimal_digits,
                    nullable: !col.not_null,
                    ordinal_position: col.cid as usize + 1,
                    is_autoincrement,
                }
            })
            .collect();
        Ok(columns)
    }

    async fn primary_keys(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        let schema = self.schema_or_default(schema).to_string();
        let mut info: Vec<TableInfoRow> = self
            .table_info(&schema, table)
            .await?
            .into_iter()
            .filter(|c| c.pk > 0)
            .collect();
        info.sort_by_key(|c| c.pk);
        Ok(info.into_iter().map(|c| c.name).collect())
    }

    async fn imported_keys(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ImportedKeyRow>> {
        let schema = self.schema_or_default(schema).to_string();
        let sql = format!(
            "PRAGMA {}.foreign_key_list({})",
            quote_ansi(&schema)?,
            quote_ansi(table)?
        );
        let rows = sqlx::query(&sql).fetch_all(self.conn()?).await?;

        let mut keys = rows
            .iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let seq: i64 = row.try_get("seq")?;
                Ok((
                    id,
                    ImportedKeyRow {
                        fk_name: None,
                        fk_column: row.try_get("from")?,
                        pk_table: row.try_get("table")?,
                        pk_column: row.try_get("to")?,
                        key_seq: seq as usize + 1,
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        keys.sort_by_key(|(id, key)| (*id, key.key_seq));

        debug!("{} imported key columns for {}.{}", keys.len(), schema, table);
        Ok(keys.into_iter().map(|(_, key)| key).collect())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_test_session() -> SqliteSession {
        SqliteSession::open("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_affinity_rules() {
        assert_eq!(affinity_type("BIGINT"), jdbc::INTEGER);
        assert_eq!(affinity_type("VARCHAR(40)"), jdbc::VARCHAR);
        assert_eq!(affinity_type("text"), jdbc::VARCHAR);
        assert_eq!(affinity_type(""), jdbc::BLOB);
        assert_eq!(affinity_type("DOUBLE"), jdbc::REAL);
        assert_eq!(affinity_type("DECIMAL(10,2)"), jdbc::NUMERIC);
        assert_eq!(affinity_type("BOOLEAN"), jdbc::NUMERIC);
    }

    #[tokio::test]
    async fn test_query_reads_storage_classes() {
        let mut session = make_test_session().await;
        let rs = session
            .query(
                "SELECT 1 AS a, 2.5 AS b, 'x' AS c, x'0102' AS d, NULL AS e, ? AS f",
                &[SqlValue::Text("bound".into())],
            )
            .await
            .unwrap();

        assert_eq!(rs.columns.len(), 6);
        assert_eq!(rs.columns[0].name, "a");
        assert_eq!(rs.columns[5].position, 6);
        assert_eq!(
            rs.rows[0].values,
            vec![
                SqlValue::I64(1),
                SqlValue::F64(2.5),
                SqlValue::Text("x".into()),
                SqlValue::Bytes(vec![1, 2]),
                SqlValue::Null,
                SqlValue::Text("bound".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_result_columns_use_declared_types() {
        let mut session = make_test_session().await;
        session
            .execute("CREATE TABLE t (id BIGINT, ts DATETIME, flag BOOLEAN, n INTEGER)")
            .await
            .unwrap();
        session
            .execute("INSERT INTO t VALUES (5000000000, '2024-05-01 10:30:00', 1, 7)")
            .await
            .unwrap();

        let rs = session
            .query("SELECT id, ts, flag, n, n + 1 AS m FROM t", &[])
            .await
            .unwrap();
        let types: Vec<i32> = rs.columns.iter().map(|c| c.jdbc_type).collect();
        assert_eq!(
            types,
            vec![jdbc::BIGINT, jdbc::DATE, jdbc::BOOLEAN, jdbc::INTEGER, jdbc::BIGINT]
        );
        assert_eq!(rs.columns[0].type_name, "BIGINT");
        assert_eq!(rs.columns[4].type_name, "INTEGER");
        assert_eq!(rs.rows[0].values[0], SqlValue::I64(5_000_000_000));
    }

    #[tokio::test]
    async fn test_schemas_skip_temp() {
        let mut session = make_test_session().await;
        session
            .execute("CREATE TEMP TABLE scratch (x INTEGER)")
            .await
            .unwrap();
        assert_eq!(session.schemas().await.unwrap(), vec!["main"]);
    }

    #[tokio::test]
    async fn test_metadata() {
        let mut session = make_test_session().await;
        session
            .execute("CREATE TABLE owner (id INTEGER PRIMARY KEY, name VARCHAR(40) NOT NULL)")
            .await
            .unwrap();
        session
            .execute(
                "CREATE TABLE pet (id INTEGER PRIMARY KEY, owner_id INTEGER REFERENCES owner(id), \
                 weight DECIMAL(5, 2))",
            )
            .await
            .unwrap();
        session
            .execute("CREATE VIEW heavy AS SELECT * FROM pet WHERE weight > 20")
            .await
            .unwrap();

        let tables = session.tables(None).await.unwrap();
        let names: Vec<_> = tables.iter().map(|t| (t.name.as_str(), t.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("heavy", TableKind::View),
                ("owner", TableKind::Table),
                ("pet", TableKind::Table)
            ]
        );

        let columns = session.columns(None, "owner").await.unwrap();
        assert_eq!(columns[1].column_name, "name");
        assert_eq!(columns[1].type_name, "VARCHAR(40)");
        assert_eq!(columns[1].column_size, 40);
        assert!(!columns[1].nullable);
        assert!(columns[0].is_autoincrement);

        let pet = session.columns(Some("main"), "pet").await.unwrap();
        assert_eq!((pet[2].column_size, pet[2].decimal_digits), (5, 2));

        assert_eq!(session.primary_keys(None, "pet").await.unwrap(), vec!["id"]);

        let fks = session.imported_keys(None, "pet").await.unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].fk_column, "owner_id");
        assert_eq!(fks[0].pk_table, "owner");
        assert_eq!(fks[0].pk_column.as_deref(), Some("id"));
        assert_eq!(fks[0].key_seq, 1);
    }

    #[tokio::test]
    async fn test_manual_commit_and_rollback() {
        let mut session = make_test_session().await;
        session.execute("CREATE TABLE t (v INTEGER)").await.unwrap();

        session.set_auto_commit(false).await.unwrap();
        session.execute("INSERT INTO t VALUES (1)").await.unwrap();
        session.rollback().await.unwrap();
        session.execute("INSERT INTO t VALUES (2)").await.unwrap();
        session.commit().await.unwrap();
        session.set_auto_commit(true).await.unwrap();

        let rs = session.query("SELECT v FROM t", &[]).await.unwrap();
        assert_eq!(rs.rows.len(), 1);
        assert_eq!(rs.rows[0].values[0], SqlValue::I64(2));
    }

    #[tokio::test]
    async fn test_set_schema() {
        let mut session = make_test_session().await;
        assert!(session.set_schema("main").await.is_ok());
        assert!(session.set_schema("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_closed_session_errors() {
        let mut session = make_test_session().await;
        session.close().await.unwrap();
        assert!(session.execute("SELECT 1").await.is_err());
    }
}

//! MySQL session: statements, queries and `information_schema` metadata.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{
    Column, ConnectOptions, Connection as SqlxConnection, Executor, MySql, Row, Statement,
    TypeInfo, ValueRef,
};
use tracing::debug;

use crate::core::identifier::quote_mysql;
use crate::core::jdbc;
use crate::core::traits::{
    Connection, ImportedKeyRow, MetaRow, ResultColumn, ResultRow, ResultSet, TableKind, TableRow,
};
use crate::core::value::SqlValue;
use crate::error::{BindError, Result};

const PRODUCT_NAME: &str = "MySQL";

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// One MySQL connection.
pub struct MysqlSession {
    conn: Option<MySqlConnection>,
    url: String,
    auto_commit: bool,
}

impl MysqlSession {
    pub async fn open(url: &str, user: Option<&str>, password: Option<&str>) -> Result<Self> {
        let mut options = MySqlConnectOptions::from_str(url)?;
        if let Some(user) = user {
            options = options.username(user);
        }
        if let Some(password) = password {
            options = options.password(password);
        }
        let conn = options.connect().await?;
        Ok(Self {
            conn: Some(conn),
            url: url.to_string(),
            auto_commit: true,
        })
    }

    fn conn(&mut self) -> Result<&mut MySqlConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| BindError::sql("connection is closed"))
    }

    /// Run `sql` over the text protocol (`USE`, `SET` and most DDL are not
    /// preparable).
    async fn execute_text(&mut self, sql: &str) -> Result<u64> {
        let done = Executor::execute(self.conn()?, sql).await?;
        Ok(done.rows_affected())
    }
}

/// Type code for a MySQL type name (`DATA_TYPE`, or SQLx's type name).
///
/// Unsigned integers widen to the next code whose value type holds their
/// full range.
fn jdbc_type_for(type_name: &str, column_type: &str) -> i32 {
    let name = type_name.to_ascii_lowercase();
    let unsigned = name.ends_with(" unsigned")
        || column_type.to_ascii_lowercase().contains("unsigned");
    let name = name.trim_end_matches(" unsigned");
    match (name, unsigned) {
        ("bit", _) => jdbc::BIT,
        ("boolean" | "bool", _) => jdbc::BOOLEAN,
        ("tinyint", false) if column_type.eq_ignore_ascii_case("tinyint(1)") => jdbc::BIT,
        ("tinyint", false) => jdbc::TINYINT,
        ("tinyint", true) => jdbc::SMALLINT,
        ("smallint", false) => jdbc::SMALLINT,
        ("smallint" | "mediumint", true) => jdbc::INTEGER,
        ("mediumint" | "int" | "integer", false) => jdbc::INTEGER,
        ("int" | "integer", true) => jdbc::BIGINT,
        ("bigint", false) => jdbc::BIGINT,
        ("bigint", true) => jdbc::DECIMAL,
        (name, _) => jdbc_type_for_name(name),
    }
}

fn jdbc_type_for_name(name: &str) -> i32 {
    match name {
        "float" => jdbc::REAL,
        "double" | "real" => jdbc::DOUBLE,
        "decimal" | "numeric" => jdbc::DECIMAL,
        "char" | "enum" | "set" => jdbc::CHAR,
        "varchar" => jdbc::VARCHAR,
        "tinytext" | "text" | "mediumtext" | "longtext" | "json" => jdbc::LONGVARCHAR,
        "date" => jdbc::DATE,
        "year" => jdbc::SMALLINT,
        "time" => jdbc::TIME,
        "datetime" | "timestamp" => jdbc::TIMESTAMP,
        "binary" => jdbc::BINARY,
        "varbinary" => jdbc::VARBINARY,
        "tinyblob" | "blob" | "mediumblob" | "longblob" => jdbc::LONGVARBINARY,
        _ => jdbc::OTHER,
    }
}

fn bind_value<'q>(query: MySqlQuery<'q>, value: &SqlValue) -> MySqlQuery<'q> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I16(v) => query.bind(*v),
        SqlValue::I32(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeOffset(v) => query.bind(v.with_timezone(&Utc)),
        SqlValue::Uuid(v) => query.bind(v.to_string()),
    }
}

/// Convert a MySQL row to SqlValues, by each column's declared type.
fn read_row(row: &MySqlRow) -> Result<ResultRow> {
    let mut values = Vec::with_capacity(row.len());
    for (i, col) in row.columns().iter().enumerate() {
        if row.try_get_raw(i)?.is_null() {
            values.push(SqlValue::Null);
            continue;
        }

        let type_name = col.type_info().name().to_ascii_uppercase();
        let value = match type_name.as_str() {
            "BOOLEAN" => SqlValue::Bool(row.try_get_unchecked(i)?),
            "TINYINT" | "TINYINT UNSIGNED" | "SMALLINT" | "YEAR" => {
                SqlValue::I16(row.try_get_unchecked::<i64, _>(i)? as i16)
            }
            "SMALLINT UNSIGNED" | "MEDIUMINT" | "MEDIUMINT UNSIGNED" | "INT" => {
                SqlValue::I32(row.try_get_unchecked::<i64, _>(i)? as i32)
            }
            "INT UNSIGNED" | "BIGINT" => SqlValue::I64(row.try_get_unchecked(i)?),
            "BIGINT UNSIGNED" => {
                let v: u64 = row.try_get_unchecked(i)?;
                i64::try_from(v)
                    .map(SqlValue::I64)
                    .unwrap_or_else(|_| SqlValue::Decimal(Decimal::from(v)))
            }
            "FLOAT" => SqlValue::F32(row.try_get_unchecked(i)?),
            "DOUBLE" => SqlValue::F64(row.try_get_unchecked(i)?),
            "DECIMAL" => SqlValue::Decimal(row.try_get_unchecked(i)?),
            "DATE" => SqlValue::Date(row.try_get_unchecked::<NaiveDate, _>(i)?),
            "TIME" => SqlValue::Time(row.try_get_unchecked::<NaiveTime, _>(i)?),
            "DATETIME" | "TIMESTAMP" => {
                SqlValue::DateTime(row.try_get_unchecked::<NaiveDateTime, _>(i)?)
            }
            "BIT" => {
                let bytes: Vec<u8> = row.try_get_unchecked(i)?;
                SqlValue::I64(bytes.iter().fold(0i64, |acc, b| (acc << 8) | *b as i64))
            }
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
            | "GEOMETRY" => SqlValue::Bytes(row.try_get_unchecked(i)?),
            _ => SqlValue::Text(row.try_get_unchecked(i)?),
        };
        values.push(value);
    }
    Ok(ResultRow { values })
}

#[async_trait]
impl Connection for MysqlSession {
    fn product_name(&self) -> &str {
        PRODUCT_NAME
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit != self.auto_commit {
            let sql = if auto_commit {
                "SET autocommit = 1"
            } else {
                "SET autocommit = 0"
            };
            self.execute_text(sql).await?;
            self.auto_commit = auto_commit;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute_text("COMMIT").await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute_text("ROLLBACK").await.map(|_| ())
    }

    async fn set_schema(&mut self, schema: &str) -> Result<()> {
        let sql = format!("USE {}", quote_mysql(schema)?);
        self.execute_text(&sql).await.map(|_| ())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.execute_text(sql).await
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        let conn = self.conn()?;

        let columns: Vec<ResultColumn> = {
            let statement = (&mut *conn).prepare(sql).await?;
            statement
                .columns()
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let type_name = col.type_info().name().to_string();
                    ResultColumn {
                        name: col.name().to_string(),
                        position: i + 1,
                        jdbc_type: jdbc_type_for(&type_name, ""),
                        type_name,
                        nullable: true,
                    }
                })
                .collect()
        };

        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let rows = query.fetch_all(&mut *conn).await?;
        let rows = rows.iter().map(read_row).collect::<Result<Vec<_>>>()?;

        Ok(ResultSet { columns, rows })
    }

    async fn schemas(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT CAST(SCHEMA_NAME AS CHAR(255)) AS SCHEMA_NAME \
             FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME",
        )
        .fetch_all(self.conn()?)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("SCHEMA_NAME").map_err(BindError::from))
            .collect()
    }

    async fn tables(&mut self, schema: Option<&str>) -> Result<Vec<TableRow>> {
        let query = r#"
            SELECT
                CAST(TABLE_SCHEMA AS CHAR(255)) AS TABLE_SCHEMA,
                CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME,
                CAST(TABLE_TYPE AS CHAR(64)) AS TABLE_TYPE
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            ORDER BY TABLE_NAME
        "#;
        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(schema.map(str::to_string))
            .fetch_all(self.conn()?)
            .await?;

        rows.iter()
            .map(|row| {
                let table_type: String = row.try_get("TABLE_TYPE")?;
                Ok(TableRow {
                    schema: Some(row.try_get("TABLE_SCHEMA")?),
                    name: row.try_get("TABLE_NAME")?,
                    kind: if table_type.contains("VIEW") {
                        TableKind::View
                    } else {
                        TableKind::Table
                    },
                })
            })
            .collect()
    }

    async fn columns(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<MetaRow>> {
        // Cap max_length at i32 max; LONGTEXT and friends report 4294967295.
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE,
                CAST(COLUMN_TYPE AS CHAR(255)) AS COLUMN_TYPE,
                CAST(CASE
                    WHEN CHARACTER_MAXIMUM_LENGTH IS NOT NULL
                        THEN LEAST(CHARACTER_MAXIMUM_LENGTH, 2147483647)
                    ELSE COALESCE(NUMERIC_PRECISION, DATETIME_PRECISION, 0)
                END AS SIGNED) AS column_size,
                CAST(COALESCE(NUMERIC_SCALE, 0) AS SIGNED) AS num_scale,
                IF(IS_NULLABLE = 'YES', 1, 0) AS is_nullable,
                IF(EXTRA LIKE '%auto_increment%', 1, 0) AS is_identity,
                CAST(ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;
        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(schema.map(str::to_string))
            .bind(table.to_string())
            .fetch_all(self.conn()?)
            .await?;

        rows.iter()
            .map(|row| {
                let data_type: String = row.try_get("DATA_TYPE")?;
                let column_type: String = row.try_get("COLUMN_TYPE")?;
                Ok(MetaRow {
                    table_name: table.to_string(),
                    column_name: row.try_get("COLUMN_NAME")?,
                    data_type: jdbc_type_for(&data_type, &column_type),
                    type_name: data_type.to_ascii_uppercase(),
                    column_size: row.try_get::<i64, _>("column_size")? as i32,
                    decimal_digits: row.try_get::<i64, _>("num_scale")? as i32,
                    nullable: row.try_get::<i32, _>("is_nullable")? == 1,
                    ordinal_position: row.try_get::<i64, _>("ORDINAL_POSITION")? as usize,
                    is_autoincrement: row.try_get::<i32, _>("is_identity")? == 1,
                })
            })
            .collect()
    }

    async fn primary_keys(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
              AND TABLE_NAME = ?
              AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;
        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(schema.map(str::to_string))
            .bind(table.to_string())
            .fetch_all(self.conn()?)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("COLUMN_NAME").map_err(BindError::from))
            .collect()
    }

    async fn imported_keys(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ImportedKeyRow>> {
        let query = r#"
            SELECT
                CAST(CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME,
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME,
                CAST(REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME,
                CAST(ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
              AND TABLE_NAME = ?
              AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;
        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(schema.map(str::to_string))
            .bind(table.to_string())
            .fetch_all(self.conn()?)
            .await?;

        debug!("{} imported key columns for {}", rows.len(), table);
        rows.iter()
            .map(|row| {
                Ok(ImportedKeyRow {
                    fk_name: Some(row.try_get("CONSTRAINT_NAME")?),
                    fk_column: row.try_get("COLUMN_NAME")?,
                    pk_table: row.try_get("REFERENCED_TABLE_NAME")?,
                    pk_column: row.try_get("REFERENCED_COLUMN_NAME")?,
                    key_seq: row.try_get::<i64, _>("ORDINAL_POSITION")? as usize,
                })
            })
            .collect()
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

    #[test]
    fn test_jdbc_type_for() {
        assert_eq!(jdbc_type_for("int", "int(11)"), jdbc::INTEGER);
        assert_eq!(jdbc_type_for("INT UNSIGNED", ""), jdbc::BIGINT);
        assert_eq!(jdbc_type_for("int", "int(10) unsigned"), jdbc::BIGINT);
        assert_eq!(jdbc_type_for("SMALLINT UNSIGNED", ""), jdbc::INTEGER);
        assert_eq!(jdbc_type_for("MEDIUMINT UNSIGNED", ""), jdbc::INTEGER);
        assert_eq!(jdbc_type_for("TINYINT UNSIGNED", ""), jdbc::SMALLINT);
        assert_eq!(jdbc_type_for("tinyint", "tinyint(1) unsigned"), jdbc::SMALLINT);
        assert_eq!(jdbc_type_for("BIGINT UNSIGNED", ""), jdbc::DECIMAL);
        assert_eq!(jdbc_type_for("YEAR", ""), jdbc::SMALLINT);
        assert_eq!(jdbc_type_for("tinyint", "tinyint(1)"), jdbc::BIT);
        assert_eq!(jdbc_type_for("tinyint", "tinyint(4)"), jdbc::TINYINT);
        assert_eq!(jdbc_type_for("varchar", "varchar(40)"), jdbc::VARCHAR);
        assert_eq!(jdbc_type_for("longtext", "longtext"), jdbc::LONGVARCHAR);
        assert_eq!(jdbc_type_for("DATETIME", ""), jdbc::TIMESTAMP);
        assert_eq!(jdbc_type_for("geometry", "geometry"), jdbc::OTHER);
    }
}

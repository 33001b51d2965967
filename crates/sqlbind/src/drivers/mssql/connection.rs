//! SQL Server session over a single Tiberius client.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{AuthMethod, Client, ColumnData, ColumnType, Config, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::core::jdbc;
use crate::core::traits::{
    Connection, ImportedKeyRow, MetaRow, ResultColumn, ResultRow, ResultSet, TableKind, TableRow,
};
use crate::core::value::SqlValue;
use crate::drivers::common::TxState;
use crate::error::{BindError, Result};

const PRODUCT_NAME: &str = "Microsoft SQL Server";
const DEFAULT_SCHEMA: &str = "dbo";

/// Vendor type code SQL Server reports for `datetimeoffset`.
const DATETIMEOFFSET: i32 = -155;

/// One SQL Server connection.
pub struct MssqlSession {
    client: Option<Client<Compat<TcpStream>>>,
    url: String,
    schema: String,
    tx: TxState,
}

impl MssqlSession {
    pub async fn open(url: &str, user: Option<&str>, password: Option<&str>) -> Result<Self> {
        let mut config = Config::from_jdbc_string(&format!("jdbc:{}", url))?;
        if let Some(user) = user {
            config.authentication(AuthMethod::sql_server(user, password.unwrap_or_default()));
        }

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true).ok();
        let client = Client::connect(config, tcp.compat_write()).await?;

        Ok(Self {
            client: Some(client),
            url: url.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            tx: TxState::default(),
        })
    }

    fn client(&mut self) -> Result<&mut Client<Compat<TcpStream>>> {
        self.client
            .as_mut()
            .ok_or_else(|| BindError::sql("connection is closed"))
    }

    async fn begin_if_needed(&mut self) -> Result<()> {
        if self.tx.needs_begin() {
            self.client()?.execute("BEGIN TRANSACTION", &[]).await?;
            self.tx.opened();
        }
        Ok(())
    }

    async fn end_transaction(&mut self, statement: &str) -> Result<()> {
        if self.tx.is_open() {
            self.client()?.execute(statement, &[]).await?;
            self.tx.closed();
        }
        Ok(())
    }

    fn schema_or_default(&self, schema: Option<&str>) -> String {
        schema
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.schema)
            .to_string()
    }

    /// Rows of a metadata query with string parameters.
    async fn metadata_rows(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        let mut query = Query::new(sql);
        for p in params {
            query.bind(p.to_string());
        }
        let stream = query.query(self.client()?).await?;
        Ok(stream.into_first_result().await?)
    }
}

fn text(row: &Row, idx: usize) -> Result<String> {
    Ok(row.try_get::<&str, _>(idx)?.unwrap_or_default().to_string())
}

fn int(row: &Row, idx: usize) -> Result<i32> {
    Ok(row.try_get::<i32, _>(idx)?.unwrap_or(0))
}

/// Type code for an `INFORMATION_SCHEMA` `DATA_TYPE`.
fn jdbc_type_for(data_type: &str) -> i32 {
    match data_type.to_ascii_lowercase().as_str() {
        "bit" => jdbc::BIT,
        "tinyint" => jdbc::TINYINT,
        "smallint" => jdbc::SMALLINT,
        "int" => jdbc::INTEGER,
        "bigint" => jdbc::BIGINT,
        "real" => jdbc::REAL,
        "float" => jdbc::DOUBLE,
        "decimal" | "numeric" | "money" | "smallmoney" => jdbc::DECIMAL,
        "char" | "uniqueidentifier" => jdbc::CHAR,
        "varchar" => jdbc::VARCHAR,
        "nchar" => jdbc::NCHAR,
        "nvarchar" => jdbc::NVARCHAR,
        "text" => jdbc::LONGVARCHAR,
        "ntext" => jdbc::LONGNVARCHAR,
        "xml" => jdbc::SQLXML,
        "date" => jdbc::DATE,
        "time" => jdbc::TIME,
        "datetime" | "datetime2" | "smalldatetime" => jdbc::TIMESTAMP,
        "datetimeoffset" => DATETIMEOFFSET,
        "binary" => jdbc::BINARY,
        "varbinary" | "timestamp" | "rowversion" => jdbc::VARBINARY,
        "image" => jdbc::LONGVARBINARY,
        _ => jdbc::OTHER,
    }
}

/// Type code and name for a result column's wire type.
fn column_type_info(ty: ColumnType) -> (i32, &'static str) {
    match ty {
        ColumnType::Bit | ColumnType::Bitn => (jdbc::BIT, "bit"),
        ColumnType::Int1 => (jdbc::TINYINT, "tinyint"),
        ColumnType::Int2 => (jdbc::SMALLINT, "smallint"),
        ColumnType::Int4 | ColumnType::Intn => (jdbc::INTEGER, "int"),
        ColumnType::Int8 => (jdbc::BIGINT, "bigint"),
        ColumnType::Float4 => (jdbc::REAL, "real"),
        ColumnType::Float8 | ColumnType::Floatn => (jdbc::DOUBLE, "float"),
        ColumnType::Money | ColumnType::Money4 | ColumnType::Moneyn => (jdbc::DECIMAL, "money"),
        ColumnType::Decimaln | ColumnType::Numericn => (jdbc::DECIMAL, "decimal"),
        ColumnType::Datetime | ColumnType::Datetime4 | ColumnType::Datetimen => {
            (jdbc::TIMESTAMP, "datetime")
        }
        ColumnType::Datetime2 => (jdbc::TIMESTAMP, "datetime2"),
        ColumnType::Daten => (jdbc::DATE, "date"),
        ColumnType::Timen => (jdbc::TIME, "time"),
        ColumnType::DatetimeOffsetn => (DATETIMEOFFSET, "datetimeoffset"),
        ColumnType::Guid => (jdbc::CHAR, "uniqueidentifier"),
        ColumnType::BigChar => (jdbc::CHAR, "char"),
        ColumnType::BigVarChar => (jdbc::VARCHAR, "varchar"),
        ColumnType::NChar => (jdbc::NCHAR, "nchar"),
        ColumnType::NVarchar => (jdbc::NVARCHAR, "nvarchar"),
        ColumnType::Text => (jdbc::LONGVARCHAR, "text"),
        ColumnType::NText => (jdbc::LONGNVARCHAR, "ntext"),
        ColumnType::Xml => (jdbc::SQLXML, "xml"),
        ColumnType::BigBinary => (jdbc::BINARY, "binary"),
        ColumnType::BigVarBin => (jdbc::VARBINARY, "varbinary"),
        ColumnType::Image => (jdbc::LONGVARBINARY, "image"),
        _ => (jdbc::OTHER, "sql_variant"),
    }
}

fn bind_value(query: &mut Query<'_>, value: &SqlValue) {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
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
        SqlValue::DateTimeOffset(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(*v),
    }
}

/// Convert one cell to a SqlValue.
fn convert_cell(data: &ColumnData<'static>) -> Result<SqlValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| SqlValue::I16(v as i16)),
        ColumnData::I16(v) => v.map(SqlValue::I16),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::F32(v) => v.map(SqlValue::F32),
        ColumnData::F64(v) => v.map(SqlValue::F64),
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::String(v) => v.as_ref().map(|s| SqlValue::Text(s.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| SqlValue::Bytes(b.to_vec())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| SqlValue::Text(x.clone().into_owned().into_string())),
        ColumnData::Numeric(_) => rust_decimal::Decimal::from_sql(data)?.map(SqlValue::Decimal),
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.map(SqlValue::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.map(SqlValue::Time),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map(SqlValue::DateTime)
        }
        ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(data)?.map(SqlValue::DateTimeOffset)
        }
        #[allow(unreachable_patterns)]
        _ => return Err(BindError::Value(format!("unsupported column data: {:?}", data))),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

#[async_trait]
impl Connection for MssqlSession {
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
            self.end_transaction("COMMIT TRANSACTION").await?;
        }
        self.tx.set_auto_commit(auto_commit);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.end_transaction("COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK TRANSACTION").await
    }

    /// SQL Server has no session schema; the name becomes the default for
    /// metadata lookups.
    async fn set_schema(&mut self, schema: &str) -> Result<()> {
        if !self.schemas().await?.iter().any(|s| s == schema) {
            return Err(BindError::sql(format!("unknown schema: {}", schema)));
        }
        self.schema = schema.to_string();
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.begin_if_needed().await?;
        let result = self.client()?.execute(sql, &[]).await?;
        Ok(result.total())
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        self.begin_if_needed().await?;

        let mut query = Query::new(sql);
        for p in params {
            bind_value(&mut query, p);
        }
        let mut stream = query.query(self.client()?).await?;

        let columns: Vec<ResultColumn> = stream
            .columns()
            .await?
            .map(|cols| {
                cols.iter()
                    .enumerate()
                    .map(|(i, col)| {
                        let (jdbc_type, type_name) = column_type_info(col.column_type());
                        ResultColumn {
                            name: col.name().to_string(),
                            position: i + 1,
                            jdbc_type,
                            type_name: type_name.to_string(),
                            nullable: true,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let rows = stream
            .into_first_result()
            .await?
            .iter()
            .map(|row| {
                let values = row
                    .cells()
                    .map(|(_, data)| convert_cell(data))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ResultRow { values })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResultSet { columns, rows })
    }

    async fn schemas(&mut self) -> Result<Vec<String>> {
        let rows = self
            .metadata_rows("SELECT name FROM sys.schemas ORDER BY name", &[])
            .await?;
        rows.iter().map(|row| text(row, 0)).collect()
    }

    async fn tables(&mut self, schema: Option<&str>) -> Result<Vec<TableRow>> {
        let schema = self.schema_or_default(schema);
        let query = r#"
            SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = @P1
            ORDER BY TABLE_NAME
        "#;
        let rows = self.metadata_rows(query, &[schema.as_str()]).await?;

        rows.iter()
            .map(|row| {
                Ok(TableRow {
                    schema: Some(text(row, 0)?),
                    name: text(row, 1)?,
                    kind: if text(row, 2)? == "VIEW" {
                        TableKind::View
                    } else {
                        TableKind::Table
                    },
                })
            })
            .collect()
    }

    async fn columns(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<MetaRow>> {
        let schema = self.schema_or_default(schema);
        let query = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                CAST(COALESCE(CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, DATETIME_PRECISION, 0) AS INT),
                CAST(ISNULL(NUMERIC_SCALE, 0) AS INT),
                CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(TABLE_SCHEMA) + '.' + QUOTENAME(TABLE_NAME)), COLUMN_NAME, 'IsIdentity'), 0),
                ORDINAL_POSITION
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
        "#;
        let rows = self.metadata_rows(query, &[schema.as_str(), table]).await?;

        rows.iter()
            .map(|row| {
                let data_type = text(row, 1)?;
                Ok(MetaRow {
                    table_name: table.to_string(),
                    column_name: text(row, 0)?,
                    data_type: jdbc_type_for(&data_type),
                    type_name: data_type,
                    column_size: int(row, 2)?,
                    decimal_digits: int(row, 3)?,
                    nullable: int(row, 4)? == 1,
                    is_autoincrement: int(row, 5)? == 1,
                    ordinal_position: int(row, 6)? as usize,
                })
            })
            .collect()
    }

    async fn primary_keys(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        let schema = self.schema_or_default(schema);
        let query = r#"
            SELECT c.COLUMN_NAME
            FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
            JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE c
                ON c.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                AND c.TABLE_SCHEMA = tc.TABLE_SCHEMA
                AND c.TABLE_NAME = tc.TABLE_NAME
            WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
              AND tc.TABLE_SCHEMA = @P1
              AND tc.TABLE_NAME = @P2
            ORDER BY c.ORDINAL_POSITION
        "#;
        let rows = self.metadata_rows(query, &[schema.as_str(), table]).await?;
        rows.iter().map(|row| text(row, 0)).collect()
    }

    async fn imported_keys(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ImportedKeyRow>> {
        let schema = self.schema_or_default(schema);
        let query = r#"
            SELECT
                fk.name,
                pc.name,
                rt.name,
                rc.name,
                fkc.constraint_column_id
            FROM sys.foreign_keys fk
            JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
            JOIN sys.tables pt ON pt.object_id = fk.parent_object_id
            JOIN sys.schemas s ON s.schema_id = pt.schema_id
            JOIN sys.columns pc
                ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
            JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
            JOIN sys.columns rc
                ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
            WHERE s.name = @P1 AND pt.name = @P2
            ORDER BY fk.name, fkc.constraint_column_id
        "#;
        let rows = self.metadata_rows(query, &[schema.as_str(), table]).await?;

        debug!("{} imported key columns for {}.{}", rows.len(), schema, table);
        rows.iter()
            .map(|row| {
                Ok(ImportedKeyRow {
                    fk_name: Some(text(row, 0)?),
                    fk_column: text(row, 1)?,
                    pk_table: text(row, 2)?,
                    pk_column: Some(text(row, 3)?),
                    key_seq: int(row, 4)? as usize,
                })
            })
            .collect()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jdbc_type_for() {
        assert_eq!(jdbc_type_for("int"), jdbc::INTEGER);
        assert_eq!(jdbc_type_for("NVARCHAR"), jdbc::NVARCHAR);
        assert_eq!(jdbc_type_for("datetime2"), jdbc::TIMESTAMP);
        assert_eq!(jdbc_type_for("datetimeoffset"), DATETIMEOFFSET);
        assert_eq!(jdbc_type_for("hierarchyid"), jdbc::OTHER);
    }

    #[test]
    fn test_convert_cell() {
        assert_eq!(convert_cell(&ColumnData::I32(Some(7))).unwrap(), SqlValue::I32(7));
        assert_eq!(convert_cell(&ColumnData::I32(None)).unwrap(), SqlValue::Null);
        assert_eq!(convert_cell(&ColumnData::U8(Some(255))).unwrap(), SqlValue::I16(255));
        assert_eq!(
            convert_cell(&ColumnData::String(Some("abc".into()))).unwrap(),
            SqlValue::Text("abc".into())
        );
        assert_eq!(convert_cell(&ColumnData::Bit(Some(true))).unwrap(), SqlValue::Bool(true));
    }
}

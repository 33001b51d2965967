//! Running SQL through the value accessors.
//!
//! Parameters are written with the accessor of each value's natural type
//! code and every result column is read with the accessor of its own code,
//! so values come back in the representation generated code declares.

use tracing::debug;

use crate::accessor::{ParameterSlots, ValueAccessorProvider};
use crate::core::traits::{Connection, ResultRow, ResultSet, RowCursor};
use crate::core::value::SqlValue;
use crate::error::{BindError, Result};
use crate::schema::{KeyRef, Schema, Table};

/// A SQL statement with positional parameters.
///
/// ```rust,ignore
/// let rows = Query::new("SELECT * FROM pet WHERE owner_id = ?")
///     .param(7)
///     .execute(conn.as_mut(), ctx.accessors())
///     .await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    params: Vec<SqlValue>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append the next positional parameter.
    pub fn param(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Parameter values as the accessors write them.
    pub fn bind(&self, accessors: &ValueAccessorProvider) -> Result<Vec<SqlValue>> {
        let mut slots = ParameterSlots::new(self.params.len());
        for (i, value) in self.params.iter().enumerate() {
            accessors
                .get(value.natural_jdbc_type())
                .write_parameter(&mut slots, i + 1, value)?;
        }
        slots.into_values()
    }

    pub async fn execute(
        &self,
        conn: &mut dyn Connection,
        accessors: &ValueAccessorProvider,
    ) -> Result<ResultSet> {
        let params = self.bind(accessors)?;
        debug!("Executing query with {} parameters: {}", params.len(), self.sql);

        let raw = conn.query(&self.sql, &params).await?;
        read_rows(raw, accessors)
    }
}

/// Re-read every cell of `raw` through its column's accessor.
fn read_rows(raw: ResultSet, accessors: &ValueAccessorProvider) -> Result<ResultSet> {
    let column_accessors: Vec<_> = raw
        .columns
        .iter()
        .map(|c| accessors.get(c.jdbc_type))
        .collect();

    let rows = raw
        .rows
        .iter()
        .map(|row| {
            let values = raw
                .columns
                .iter()
                .zip(&column_accessors)
                .map(|(column, accessor)| accessor.read_value(row, column))
                .collect::<Result<Vec<_>>>()?;
            Ok(ResultRow { values })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResultSet {
        columns: raw.columns,
        rows,
    })
}

/// Follow `key_ref` from `row`, a row of `table` with its columns in table
/// order, to the referenced row. Returns `None` for a NULL key or a dangling
/// reference.
pub async fn fetch_ref(
    conn: &mut dyn Connection,
    accessors: &ValueAccessorProvider,
    schema: &Schema,
    table: &Table,
    row: &ResultRow,
    key_ref: &KeyRef,
) -> Result<Option<ResultRow>> {
    let key_column = table.column(&key_ref.key_column).ok_or_else(|| {
        BindError::Value(format!(
            "table {} has no column {}",
            table.name, key_ref.key_column
        ))
    })?;

    let key = row.get_object(key_column.position)?;
    if key.is_null() {
        return Ok(None);
    }

    let Some(target) = schema.table(key_ref.target) else {
        return Ok(None);
    };
    let vendor = schema.vendor();
    let sql = format!(
        "SELECT * FROM {} WHERE {} = {}",
        vendor.quote_ident(&target.name)?,
        vendor.quote_ident(&key_ref.ref_column)?,
        vendor.param_placeholder(1)
    );

    let result = Query::new(sql).param(key).execute(conn, accessors).await?;
    Ok(result.rows.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jdbc;
    use crate::core::traits::ResultColumn;
    use chrono::NaiveDate;

    fn column(name: &str, position: usize, jdbc_type: i32) -> ResultColumn {
        ResultColumn {
            name: name.to_string(),
            position,
            jdbc_type,
            type_name: String::new(),
            nullable: true,
        }
    }

    #[test]
    fn test_bind_uses_natural_accessor() {
        let accessors = ValueAccessorProvider::new();
        let query = Query::new("SELECT ?, ?, ?")
            .param(7)
            .param("x")
            .param(SqlValue::Null);
        let values = query.bind(&accessors).unwrap();
        assert_eq!(
            values,
            vec![
                SqlValue::I32(7),
                SqlValue::Text("x".to_string()),
                SqlValue::Null
            ]
        );
        assert_eq!(query.params().len(), 3);
    }

    #[test]
    fn test_read_rows_converts_by_column_type() {
        let accessors = ValueAccessorProvider::new();
        let raw = ResultSet {
            columns: vec![
                column("id", 1, jdbc::INTEGER),
                column("born", 2, jdbc::DATE),
                column("alive", 3, jdbc::BOOLEAN),
            ],
            rows: vec![ResultRow {
                values: vec![
                    SqlValue::I64(3),
                    SqlValue::Text("2020-02-29".to_string()),
                    SqlValue::I64(0),
                ],
            }],
        };

        let result = read_rows(raw, &accessors).unwrap();
        assert_eq!(
            result.rows[0].values,
            vec![
                SqlValue::I32(3),
                SqlValue::Date(NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()),
                SqlValue::Bool(false),
            ]
        );
    }

    #[test]
    fn test_read_rows_keeps_nulls() {
        let accessors = ValueAccessorProvider::new();
        let raw = ResultSet {
            columns: vec![column("name", 1, jdbc::VARCHAR)],
            rows: vec![ResultRow {
                values: vec![SqlValue::Null],
            }],
        };
        let result = read_rows(raw, &accessors).unwrap();
        assert_eq!(result.rows[0].values, vec![SqlValue::Null]);
    }
}

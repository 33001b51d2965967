//! SQL value types exchanged with drivers.
//!
//! [`SqlValue`] is the unit every driver produces when reading a row and
//! consumes when binding a parameter. The `to_*` conversions implement the
//! lenient coercions a JDBC `ResultSet` getter performs (e.g. reading an
//! `INTEGER` storage value as a `bool`, or a `TEXT` value as a date).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::jdbc;
use crate::error::{BindError, Result};

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 16-bit signed integer (smallint, tinyint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (double precision/float).
    F64(f64),

    /// Exact decimal value.
    Decimal(Decimal),

    /// Text/string data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// UUID/GUID value.
    Uuid(Uuid),
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The JDBC type code a value of this kind is naturally bound as.
    #[must_use]
    pub fn natural_jdbc_type(&self) -> i32 {
        match self {
            SqlValue::Null => jdbc::NULL,
            SqlValue::Bool(_) => jdbc::BOOLEAN,
            SqlValue::I16(_) => jdbc::SMALLINT,
            SqlValue::I32(_) => jdbc::INTEGER,
            SqlValue::I64(_) => jdbc::BIGINT,
            SqlValue::F32(_) => jdbc::REAL,
            SqlValue::F64(_) => jdbc::DOUBLE,
            SqlValue::Decimal(_) => jdbc::DECIMAL,
            SqlValue::Text(_) => jdbc::VARCHAR,
            SqlValue::Bytes(_) => jdbc::VARBINARY,
            SqlValue::Date(_) => jdbc::DATE,
            SqlValue::Time(_) => jdbc::TIME,
            SqlValue::DateTime(_) => jdbc::TIMESTAMP,
            SqlValue::DateTimeOffset(_) => jdbc::TIMESTAMP_WITH_TIMEZONE,
            SqlValue::Uuid(_) => jdbc::OTHER,
        }
    }

    /// Short name of the value kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::I16(_) => "i16",
            SqlValue::I32(_) => "i32",
            SqlValue::I64(_) => "i64",
            SqlValue::F32(_) => "f32",
            SqlValue::F64(_) => "f64",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
            SqlValue::DateTime(_) => "datetime",
            SqlValue::DateTimeOffset(_) => "datetimeoffset",
            SqlValue::Uuid(_) => "uuid",
        }
    }

    fn mismatch(&self, target: &str) -> BindError {
        BindError::Value(format!("cannot read {} value as {}", self.kind(), target))
    }

    pub fn to_bool(&self) -> Result<Option<bool>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::Bool(v) => *v,
            SqlValue::I16(v) => *v != 0,
            SqlValue::I32(v) => *v != 0,
            SqlValue::I64(v) => *v != 0,
            SqlValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => true,
                "false" | "f" | "0" | "no" | "n" => false,
                _ => return Err(self.mismatch("bool")),
            },
            _ => return Err(self.mismatch("bool")),
        }))
    }

    pub fn to_i64(&self) -> Result<Option<i64>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::Bool(v) => i64::from(*v),
            SqlValue::I16(v) => i64::from(*v),
            SqlValue::I32(v) => i64::from(*v),
            SqlValue::I64(v) => *v,
            SqlValue::F32(v) => *v as i64,
            SqlValue::F64(v) => *v as i64,
            SqlValue::Decimal(d) => d.trunc().to_i64().ok_or_else(|| self.mismatch("i64"))?,
            SqlValue::Text(s) => s.trim().parse().map_err(|_| self.mismatch("i64"))?,
            _ => return Err(self.mismatch("i64")),
        }))
    }

    pub fn to_i32(&self) -> Result<Option<i32>> {
        match self.to_i64()? {
            None => Ok(None),
            Some(v) => i32::try_from(v)
                .map(Some)
                .map_err(|_| BindError::Value(format!("value {} out of range for i32", v))),
        }
    }

    pub fn to_i16(&self) -> Result<Option<i16>> {
        match self.to_i64()? {
            None => Ok(None),
            Some(v) => i16::try_from(v)
                .map(Some)
                .map_err(|_| BindError::Value(format!("value {} out of range for i16", v))),
        }
    }

    pub fn to_f64(&self) -> Result<Option<f64>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::I16(v) => f64::from(*v),
            SqlValue::I32(v) => f64::from(*v),
            SqlValue::I64(v) => *v as f64,
            SqlValue::F32(v) => f64::from(*v),
            SqlValue::F64(v) => *v,
            SqlValue::Decimal(d) => d.to_f64().ok_or_else(|| self.mismatch("f64"))?,
            SqlValue::Text(s) => s.trim().parse().map_err(|_| self.mismatch("f64"))?,
            _ => return Err(self.mismatch("f64")),
        }))
    }

    pub fn to_f32(&self) -> Result<Option<f32>> {
        Ok(self.to_f64()?.map(|v| v as f32))
    }

    pub fn to_decimal(&self) -> Result<Option<Decimal>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::I16(v) => Decimal::from(*v),
            SqlValue::I32(v) => Decimal::from(*v),
            SqlValue::I64(v) => Decimal::from(*v),
            SqlValue::F32(v) => Decimal::from_f32(*v).ok_or_else(|| self.mismatch("decimal"))?,
            SqlValue::F64(v) => Decimal::from_f64(*v).ok_or_else(|| self.mismatch("decimal"))?,
            SqlValue::Decimal(d) => *d,
            SqlValue::Text(s) => Decimal::from_str(s.trim()).map_err(|_| self.mismatch("decimal"))?,
            _ => return Err(self.mismatch("decimal")),
        }))
    }

    pub fn to_text(&self) -> Result<Option<String>> {
        Ok(match self {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Bytes(b) => Some(
                String::from_utf8(b.clone()).map_err(|_| self.mismatch("text"))?,
            ),
            other => Some(other.to_string()),
        })
    }

    pub fn to_bytes(&self) -> Result<Option<Vec<u8>>> {
        Ok(match self {
            SqlValue::Null => None,
            SqlValue::Bytes(b) => Some(b.clone()),
            SqlValue::Text(s) => Some(s.as_bytes().to_vec()),
            SqlValue::Uuid(u) => Some(u.as_bytes().to_vec()),
            _ => return Err(self.mismatch("bytes")),
        })
    }

    pub fn to_date(&self) -> Result<Option<NaiveDate>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::Date(d) => *d,
            SqlValue::DateTime(dt) => dt.date(),
            SqlValue::DateTimeOffset(dt) => dt.date_naive(),
            SqlValue::Text(s) => {
                let s = s.trim();
                match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Ok(d) => d,
                    Err(_) => parse_datetime(s).ok_or_else(|| self.mismatch("date"))?.date(),
                }
            }
            _ => return Err(self.mismatch("date")),
        }))
    }

    pub fn to_time(&self) -> Result<Option<NaiveTime>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::Time(t) => *t,
            SqlValue::DateTime(dt) => dt.time(),
            SqlValue::DateTimeOffset(dt) => dt.time(),
            SqlValue::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .map_err(|_| self.mismatch("time"))?,
            _ => return Err(self.mismatch("time")),
        }))
    }

    pub fn to_datetime(&self) -> Result<Option<NaiveDateTime>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::DateTime(dt) => *dt,
            SqlValue::DateTimeOffset(dt) => dt.naive_utc(),
            SqlValue::Date(d) => d.and_time(NaiveTime::MIN),
            SqlValue::Text(s) => {
                let s = s.trim();
                match parse_datetime(s) {
                    Some(dt) => dt,
                    None => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map(|d| d.and_time(NaiveTime::MIN))
                        .map_err(|_| self.mismatch("datetime"))?,
                }
            }
            _ => return Err(self.mismatch("datetime")),
        }))
    }

    pub fn to_datetime_offset(&self) -> Result<Option<DateTime<FixedOffset>>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::DateTimeOffset(dt) => *dt,
            SqlValue::DateTime(dt) => dt.and_utc().fixed_offset(),
            SqlValue::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .or_else(|_| DateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f%:z"))
                .map_err(|_| self.mismatch("datetimeoffset"))?,
            _ => return Err(self.mismatch("datetimeoffset")),
        }))
    }

    pub fn to_uuid(&self) -> Result<Option<Uuid>> {
        Ok(Some(match self {
            SqlValue::Null => return Ok(None),
            SqlValue::Uuid(u) => *u,
            SqlValue::Text(s) => Uuid::parse_str(s.trim()).map_err(|_| self.mismatch("uuid"))?,
            SqlValue::Bytes(b) => Uuid::from_slice(b).map_err(|_| self.mismatch("uuid"))?,
            _ => return Err(self.mismatch("uuid")),
        }))
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::I16(v) => write!(f, "{}", v),
            SqlValue::I32(v) => write!(f, "{}", v),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::F32(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Bytes(v) => {
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            SqlValue::Date(v) => write!(f, "{}", v),
            SqlValue::Time(v) => write!(f, "{}", v),
            SqlValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            SqlValue::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            SqlValue::Uuid(v) => write!(f, "{}", v),
        }
    }
}

// From implementations for common types
impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::I16(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::F32(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        SqlValue::DateTimeOffset(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_is_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::I32(42).is_null());
        assert!(SqlValue::from(None::<i32>).is_null());
    }

    #[test]
    fn test_integer_storage_reads_as_bool() {
        assert_eq!(SqlValue::I64(1).to_bool().unwrap(), Some(true));
        assert_eq!(SqlValue::I64(0).to_bool().unwrap(), Some(false));
        assert_eq!(SqlValue::Null.to_bool().unwrap(), None);
        assert!(SqlValue::F64(1.5).to_bool().is_err());
    }

    #[test]
    fn test_i32_range_checked() {
        assert_eq!(SqlValue::I64(7).to_i32().unwrap(), Some(7));
        assert!(SqlValue::I64(i64::MAX).to_i32().is_err());
    }

    #[test]
    fn test_text_storage_reads_as_temporal() {
        let v = SqlValue::Text("2024-02-29 13:45:00".to_string());
        let dt = v.to_datetime().unwrap().unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(
            v.to_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );

        let d = SqlValue::Text("2023-12-01".to_string());
        assert_eq!(
            d.to_datetime().unwrap().unwrap().time(),
            NaiveTime::MIN
        );
    }

    #[test]
    fn test_decimal_from_text() {
        let v = SqlValue::Text(" 12.50 ".to_string());
        assert_eq!(v.to_decimal().unwrap(), Some(Decimal::new(1250, 2)));
    }

    #[test]
    fn test_natural_jdbc_type() {
        assert_eq!(SqlValue::I32(1).natural_jdbc_type(), jdbc::INTEGER);
        assert_eq!(SqlValue::Bytes(vec![1]).natural_jdbc_type(), jdbc::VARBINARY);
        assert_eq!(SqlValue::Null.natural_jdbc_type(), jdbc::NULL);
    }

    #[test]
    fn test_from_implementations() {
        let v: SqlValue = 42i32.into();
        assert_eq!(v, SqlValue::I32(42));

        let v: SqlValue = "hello".into();
        assert_eq!(v, SqlValue::Text("hello".to_string()));
    }
}

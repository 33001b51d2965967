//! Value accessors: one read/write strategy per canonical JDBC type code.
//!
//! A [`ValueAccessor`] decides three things for a column or parameter of a
//! given type code:
//!
//! - the target type generated code exposes ([`ValueAccessor::target_type`])
//! - how a raw row value is read into that representation ([`ValueAccessor::read_value`])
//! - how a value is written into a statement parameter slot ([`ValueAccessor::write_parameter`])
//!
//! Accessors are looked up by type code through [`ValueAccessorProvider`].

mod params;
mod registry;

pub use params::{ParameterSlot, ParameterSlots};
pub use registry::ValueAccessorProvider;

use std::fmt;

use crate::core::jdbc;
use crate::core::traits::{BaseElement, RowCursor};
use crate::core::value::SqlValue;
use crate::error::Result;

/// Target type of a column, as generated code declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetType {
    /// Fully qualified type path (e.g. `i32`, `chrono::NaiveDate`).
    pub name: String,
    /// Whether the column admits NULL and is exposed as `Option<_>`.
    pub nullable: bool,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// In-memory representation an accessor reads into and writes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repr {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    /// Passed through untouched as a [`SqlValue`].
    Object,
}

impl Repr {
    fn type_name(self) -> &'static str {
        match self {
            Repr::Bool => "bool",
            Repr::I16 => "i16",
            Repr::I32 => "i32",
            Repr::I64 => "i64",
            Repr::F32 => "f32",
            Repr::F64 => "f64",
            Repr::Decimal => "rust_decimal::Decimal",
            Repr::Text => "String",
            Repr::Bytes => "Vec<u8>",
            Repr::Date => "chrono::NaiveDate",
            Repr::Time => "chrono::NaiveTime",
            Repr::DateTime => "chrono::NaiveDateTime",
            Repr::DateTimeOffset => "chrono::DateTime<chrono::FixedOffset>",
            Repr::Object => "sqlbind::SqlValue",
        }
    }
}

/// Read/write strategy for one canonical JDBC type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueAccessor {
    Array,
    Binary,
    Bit,
    Blob,
    Boolean,
    Char,
    Clob,
    DataLink,
    Date,
    Decimal,
    Double,
    Float,
    Integer,
    JavaObject,
    Distinct,
    LongNVarChar,
    BigInt,
    LongVarBinary,
    LongVarChar,
    NChar,
    NClob,
    Numeric,
    NVarChar,
    Other,
    Real,
    RowId,
    SmallInt,
    SqlXml,
    Timestamp,
    TimestampWithTimeZone,
    Time,
    TimeWithTimeZone,
    TinyInt,
    VarBinary,
    VarChar,
    OracleIntervalYm,
    OracleIntervalDs,
    OracleTimestampLtz,
    OracleTimestampTz,
}

impl ValueAccessor {
    /// Every accessor, in registration order.
    pub const ALL: [ValueAccessor; 39] = [
        ValueAccessor::Array,
        ValueAccessor::Binary,
        ValueAccessor::Bit,
        ValueAccessor::Blob,
        ValueAccessor::Boolean,
        ValueAccessor::Char,
        ValueAccessor::Clob,
        ValueAccessor::DataLink,
        ValueAccessor::Date,
        ValueAccessor::Decimal,
        ValueAccessor::Double,
        ValueAccessor::Float,
        ValueAccessor::Integer,
        ValueAccessor::JavaObject,
        ValueAccessor::Distinct,
        ValueAccessor::LongNVarChar,
        ValueAccessor::BigInt,
        ValueAccessor::LongVarBinary,
        ValueAccessor::LongVarChar,
        ValueAccessor::NChar,
        ValueAccessor::NClob,
        ValueAccessor::Numeric,
        ValueAccessor::NVarChar,
        ValueAccessor::Other,
        ValueAccessor::Real,
        ValueAccessor::RowId,
        ValueAccessor::SmallInt,
        ValueAccessor::SqlXml,
        ValueAccessor::Timestamp,
        ValueAccessor::TimestampWithTimeZone,
        ValueAccessor::Time,
        ValueAccessor::TimeWithTimeZone,
        ValueAccessor::TinyInt,
        ValueAccessor::VarBinary,
        ValueAccessor::VarChar,
        ValueAccessor::OracleIntervalYm,
        ValueAccessor::OracleIntervalDs,
        ValueAccessor::OracleTimestampLtz,
        ValueAccessor::OracleTimestampTz,
    ];

    /// The type code this accessor is registered under.
    pub fn jdbc_type(self) -> i32 {
        match self {
            ValueAccessor::Array => jdbc::ARRAY,
            ValueAccessor::Binary => jdbc::BINARY,
            ValueAccessor::Bit => jdbc::BIT,
            ValueAccessor::Blob => jdbc::BLOB,
            ValueAccessor::Boolean => jdbc::BOOLEAN,
            ValueAccessor::Char => jdbc::CHAR,
            ValueAccessor::Clob => jdbc::CLOB,
            ValueAccessor::DataLink => jdbc::DATALINK,
            ValueAccessor::Date => jdbc::DATE,
            ValueAccessor::Decimal => jdbc::DECIMAL,
            ValueAccessor::Double => jdbc::DOUBLE,
            ValueAccessor::Float => jdbc::FLOAT,
            ValueAccessor::Integer => jdbc::INTEGER,
            ValueAccessor::JavaObject => jdbc::JAVA_OBJECT,
            ValueAccessor::Distinct => jdbc::DISTINCT,
            ValueAccessor::LongNVarChar => jdbc::LONGNVARCHAR,
            ValueAccessor::BigInt => jdbc::BIGINT,
            ValueAccessor::LongVarBinary => jdbc::LONGVARBINARY,
            ValueAccessor::LongVarChar => jdbc::LONGVARCHAR,
            ValueAccessor::NChar => jdbc::NCHAR,
            ValueAccessor::NClob => jdbc::NCLOB,
            ValueAccessor::Numeric => jdbc::NUMERIC,
            ValueAccessor::NVarChar => jdbc::NVARCHAR,
            ValueAccessor::Other => jdbc::OTHER,
            ValueAccessor::Real => jdbc::REAL,
            ValueAccessor::RowId => jdbc::ROWID,
            ValueAccessor::SmallInt => jdbc::SMALLINT,
            ValueAccessor::SqlXml => jdbc::SQLXML,
            ValueAccessor::Timestamp => jdbc::TIMESTAMP,
            ValueAccessor::TimestampWithTimeZone => jdbc::TIMESTAMP_WITH_TIMEZONE,
            ValueAccessor::Time => jdbc::TIME,
            ValueAccessor::TimeWithTimeZone => jdbc::TIME_WITH_TIMEZONE,
            ValueAccessor::TinyInt => jdbc::TINYINT,
            ValueAccessor::VarBinary => jdbc::VARBINARY,
            ValueAccessor::VarChar => jdbc::VARCHAR,
            ValueAccessor::OracleIntervalYm => jdbc::ORACLE_INTERVALYM,
            ValueAccessor::OracleIntervalDs => jdbc::ORACLE_INTERVALDS,
            ValueAccessor::OracleTimestampLtz => jdbc::ORACLE_TIMESTAMPLTZ,
            ValueAccessor::OracleTimestampTz => jdbc::ORACLE_TIMESTAMPTZ,
        }
    }

    fn repr(self) -> Repr {
        match self {
            ValueAccessor::Bit | ValueAccessor::Boolean => Repr::Bool,
            ValueAccessor::TinyInt => Repr::I16,
            // SMALLINT shares INTEGER's representation so callers never
            // narrow or widen between the two.
            ValueAccessor::SmallInt | ValueAccessor::Integer => Repr::I32,
            ValueAccessor::BigInt => Repr::I64,
            ValueAccessor::Real => Repr::F32,
            ValueAccessor::Float | ValueAccessor::Double => Repr::F64,
            ValueAccessor::Decimal | ValueAccessor::Numeric => Repr::Decimal,
            ValueAccessor::Char
            | ValueAccessor::VarChar
            | ValueAccessor::LongVarChar
            | ValueAccessor::NChar
            | ValueAccessor::NVarChar
            | ValueAccessor::LongNVarChar
            | ValueAccessor::Clob
            | ValueAccessor::NClob
            | ValueAccessor::SqlXml
            | ValueAccessor::DataLink
            | ValueAccessor::TimeWithTimeZone
            | ValueAccessor::OracleIntervalYm
            | ValueAccessor::OracleIntervalDs => Repr::Text,
            ValueAccessor::Binary
            | ValueAccessor::VarBinary
            | ValueAccessor::LongVarBinary
            | ValueAccessor::Blob => Repr::Bytes,
            ValueAccessor::Date => Repr::Date,
            ValueAccessor::Time => Repr::Time,
            ValueAccessor::Timestamp | ValueAccessor::OracleTimestampLtz => Repr::DateTime,
            ValueAccessor::TimestampWithTimeZone | ValueAccessor::OracleTimestampTz => {
                Repr::DateTimeOffset
            }
            ValueAccessor::Array
            | ValueAccessor::JavaObject
            | ValueAccessor::Distinct
            | ValueAccessor::Other
            | ValueAccessor::RowId => Repr::Object,
        }
    }

    /// Target type for `elem`. Nullable columns are exposed as `Option<_>`,
    /// except object-typed ones, whose [`SqlValue`] already carries NULL.
    pub fn target_type(self, elem: &dyn BaseElement) -> TargetType {
        let repr = self.repr();
        TargetType {
            name: repr.type_name().to_string(),
            nullable: elem.is_nullable() && repr != Repr::Object,
        }
    }

    /// Read the value of `elem` from the current row in this accessor's
    /// representation.
    pub fn read_value(self, cursor: &dyn RowCursor, elem: &dyn BaseElement) -> Result<SqlValue> {
        let pos = elem.position();
        Ok(match self.repr() {
            Repr::Bool => cursor.get_bool(pos)?.into(),
            Repr::I16 => cursor.get_i16(pos)?.into(),
            Repr::I32 => cursor.get_i32(pos)?.into(),
            Repr::I64 => cursor.get_i64(pos)?.into(),
            Repr::F32 => cursor.get_f32(pos)?.into(),
            Repr::F64 => cursor.get_f64(pos)?.into(),
            Repr::Decimal => cursor.get_decimal(pos)?.into(),
            Repr::Text => cursor.get_string(pos)?.into(),
            Repr::Bytes => cursor.get_bytes(pos)?.into(),
            Repr::Date => cursor.get_date(pos)?.into(),
            Repr::Time => cursor.get_time(pos)?.into(),
            Repr::DateTime => cursor.get_datetime(pos)?.into(),
            Repr::DateTimeOffset => cursor.get_datetime_offset(pos)?.into(),
            Repr::Object => cursor.get_object(pos)?,
        })
    }

    /// Write `value` into parameter slot `pos` (1-based).
    ///
    /// NULL is written as a typed null. Byte-typed accessors transfer byte
    /// values directly and hand anything else over as an object.
    pub fn write_parameter(
        self,
        slots: &mut ParameterSlots,
        pos: usize,
        value: &SqlValue,
    ) -> Result<()> {
        if value.is_null() {
            return slots.set_null(pos, self.jdbc_type());
        }

        let converted: SqlValue = match self.repr() {
            Repr::Bytes => match value {
                SqlValue::Bytes(_) => value.clone(),
                other => return slots.set_object(pos, other.clone(), self.jdbc_type()),
            },
            Repr::Object => return slots.set_object(pos, value.clone(), self.jdbc_type()),
            Repr::Bool => value.to_bool()?.into(),
            Repr::I16 => value.to_i16()?.into(),
            Repr::I32 => value.to_i32()?.into(),
            Repr::I64 => value.to_i64()?.into(),
            Repr::F32 => value.to_f32()?.into(),
            Repr::F64 => value.to_f64()?.into(),
            Repr::Decimal => value.to_decimal()?.into(),
            Repr::Text => value.to_text()?.into(),
            Repr::Date => value.to_date()?.into(),
            Repr::Time => value.to_time()?.into(),
            Repr::DateTime => value.to_datetime()?.into(),
            Repr::DateTimeOffset => value.to_datetime_offset()?.into(),
        };
        slots.set_value(pos, converted)
    }
}

impl fmt::Display for ValueAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}ValueAccessor", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{ResultColumn, ResultRow};
    use std::collections::HashSet;

    fn make_test_column(jdbc_type: i32, nullable: bool) -> ResultColumn {
        ResultColumn {
            name: "c".to_string(),
            position: 1,
            jdbc_type,
            type_name: jdbc::type_name(jdbc_type).to_string(),
            nullable,
        }
    }

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<i32> = ValueAccessor::ALL.iter().map(|a| a.jdbc_type()).collect();
        assert_eq!(codes.len(), ValueAccessor::ALL.len());
    }

    #[test]
    fn test_smallint_matches_integer() {
        let col = make_test_column(jdbc::SMALLINT, false);
        assert_eq!(
            ValueAccessor::SmallInt.target_type(&col),
            ValueAccessor::Integer.target_type(&col)
        );
        assert_eq!(ValueAccessor::SmallInt.target_type(&col).name, "i32");

        let row = ResultRow {
            values: vec![SqlValue::I64(7)],
        };
        assert_eq!(
            ValueAccessor::SmallInt.read_value(&row, &col).unwrap(),
            SqlValue::I32(7)
        );
    }

    #[test]
    fn test_nullable_target_type() {
        let col = make_test_column(jdbc::VARCHAR, true);
        assert_eq!(
            ValueAccessor::VarChar.target_type(&col).to_string(),
            "Option<String>"
        );
        let obj = make_test_column(jdbc::OTHER, true);
        assert_eq!(
            ValueAccessor::Other.target_type(&obj).to_string(),
            "sqlbind::SqlValue"
        );
    }

    #[test]
    fn test_read_null() {
        let col = make_test_column(jdbc::INTEGER, true);
        let row = ResultRow {
            values: vec![SqlValue::Null],
        };
        assert_eq!(
            ValueAccessor::Integer.read_value(&row, &col).unwrap(),
            SqlValue::Null
        );
    }

    #[test]
    fn test_binary_write_paths() {
        let mut slots = ParameterSlots::new(3);
        ValueAccessor::Binary
            .write_parameter(&mut slots, 1, &SqlValue::Bytes(vec![1, 2]))
            .unwrap();
        ValueAccessor::Binary
            .write_parameter(&mut slots, 2, &SqlValue::Text("ab".to_string()))
            .unwrap();
        ValueAccessor::Binary
            .write_parameter(&mut slots, 3, &SqlValue::Null)
            .unwrap();

        assert_eq!(
            slots.get(1),
            Some(&ParameterSlot::Value(SqlValue::Bytes(vec![1, 2])))
        );
        assert_eq!(
            slots.get(2),
            Some(&ParameterSlot::Object {
                value: SqlValue::Text("ab".to_string()),
                jdbc_type: jdbc::BINARY,
            })
        );
        assert_eq!(
            slots.get(3),
            Some(&ParameterSlot::Null {
                jdbc_type: jdbc::BINARY
            })
        );
    }

    #[test]
    fn test_write_coerces_to_representation() {
        let mut slots = ParameterSlots::new(1);
        ValueAccessor::BigInt
            .write_parameter(&mut slots, 1, &SqlValue::I32(5))
            .unwrap();
        assert_eq!(slots.get(1), Some(&ParameterSlot::Value(SqlValue::I64(5))));

        let mut slots = ParameterSlots::new(1);
        let err = ValueAccessor::Integer
            .write_parameter(&mut slots, 1, &SqlValue::Bytes(vec![0]))
            .unwrap_err();
        assert!(err.to_string().contains("bytes"));
    }
}

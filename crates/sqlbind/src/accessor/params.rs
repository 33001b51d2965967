//! Positional statement parameters, filled in by value accessors.

use crate::core::value::SqlValue;
use crate::error::{BindError, Result};

/// One bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSlot {
    /// Typed SQL NULL.
    Null { jdbc_type: i32 },
    /// Value already in the accessor's representation.
    Value(SqlValue),
    /// Value handed to the driver as-is, with the declared target type.
    Object { value: SqlValue, jdbc_type: i32 },
}

impl ParameterSlot {
    fn into_value(self) -> SqlValue {
        match self {
            ParameterSlot::Null { .. } => SqlValue::Null,
            ParameterSlot::Value(v) | ParameterSlot::Object { value: v, .. } => v,
        }
    }
}

/// Parameter slots of one statement (1-based, like JDBC).
#[derive(Debug, Clone, Default)]
pub struct ParameterSlots {
    slots: Vec<Option<ParameterSlot>>,
}

impl ParameterSlots {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    fn slot_mut(&mut self, pos: usize) -> Result<&mut Option<ParameterSlot>> {
        let count = self.slots.len();
        pos.checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
            .ok_or_else(|| {
                BindError::Value(format!(
                    "parameter index {} out of range (statement has {} parameters)",
                    pos, count
                ))
            })
    }

    pub fn set_null(&mut self, pos: usize, jdbc_type: i32) -> Result<()> {
        *self.slot_mut(pos)? = Some(ParameterSlot::Null { jdbc_type });
        Ok(())
    }

    pub fn set_value(&mut self, pos: usize, value: SqlValue) -> Result<()> {
        *self.slot_mut(pos)? = Some(ParameterSlot::Value(value));
        Ok(())
    }

    pub fn set_object(&mut self, pos: usize, value: SqlValue, jdbc_type: i32) -> Result<()> {
        *self.slot_mut(pos)? = Some(ParameterSlot::Object { value, jdbc_type });
        Ok(())
    }

    pub fn get(&self, pos: usize) -> Option<&ParameterSlot> {
        pos.checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Values in position order. Every slot must have been set.
    pub fn into_values(self) -> Result<Vec<SqlValue>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.map(ParameterSlot::into_value).ok_or_else(|| {
                    BindError::Value(format!("parameter {} was not set", i + 1))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jdbc;

    #[test]
    fn test_out_of_range_position() {
        let mut slots = ParameterSlots::new(1);
        assert!(slots.set_value(0, SqlValue::I32(1)).is_err());
        assert!(slots.set_value(2, SqlValue::I32(1)).is_err());
        assert!(slots.set_value(1, SqlValue::I32(1)).is_ok());
    }

    #[test]
    fn test_into_values_requires_every_slot() {
        let mut slots = ParameterSlots::new(2);
        slots.set_null(1, jdbc::INTEGER).unwrap();
        let err = slots.clone().into_values().unwrap_err();
        assert!(err.to_string().contains("parameter 2"));

        slots.set_value(2, SqlValue::Text("x".into())).unwrap();
        assert_eq!(
            slots.into_values().unwrap(),
            vec![SqlValue::Null, SqlValue::Text("x".into())]
        );
    }
}

//! Target type map consulted when deriving column target types.
//!
//! Each accessor has a default target type. A [`TypeMap`] lets the caller
//! override it per JDBC type code (e.g. expose `DECIMAL` as `f64`, or
//! `OTHER` columns of a known vendor type as `uuid::Uuid`).

use std::collections::HashMap;

use crate::accessor::{TargetType, ValueAccessor};
use crate::core::traits::BaseElement;

#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    /// Overrides keyed by JDBC type code.
    by_code: HashMap<i32, String>,
    /// Overrides keyed by upper-cased vendor type name; checked first.
    by_vendor_name: HashMap<String, String>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every column of `jdbc_type` to `target`.
    pub fn with_code(mut self, jdbc_type: i32, target: impl Into<String>) -> Self {
        self.by_code.insert(jdbc_type, target.into());
        self
    }

    /// Map columns whose vendor type name is `type_name` (case-insensitive,
    /// qualifier stripped) to `target`.
    pub fn with_vendor_type(mut self, type_name: &str, target: impl Into<String>) -> Self {
        self.by_vendor_name
            .insert(base_type_name(type_name), target.into());
        self
    }

    /// Target type of `elem`, using an override when one matches and the
    /// accessor's default otherwise.
    pub fn target_type(&self, accessor: ValueAccessor, elem: &dyn BaseElement) -> TargetType {
        let default = accessor.target_type(elem);
        let name = self
            .by_vendor_name
            .get(&base_type_name(elem.type_name()))
            .or_else(|| self.by_code.get(&accessor.jdbc_type()));

        match name {
            Some(name) => TargetType {
                name: name.clone(),
                nullable: elem.is_nullable(),
            },
            None => default,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty() && self.by_vendor_name.is_empty()
    }
}

fn base_type_name(type_name: &str) -> String {
    type_name
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
}

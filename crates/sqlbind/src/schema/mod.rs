//! In-memory model of a database schema.
//!
//! Tables live in an arena owned by [`Schema`] and refer to each other by
//! [`TableId`]. Foreign keys are resolved in a second pass once every table
//! of the schema exists, so declaration order never matters.

mod builder;
mod cache;
mod notifier;

pub use builder::SchemaBuilder;
pub use cache::SchemaCache;
pub use notifier::SqliteForeignKeys;

use std::collections::HashMap;

use tracing::warn;

use crate::config::DbConfig;
use crate::core::identifier::IdentifierMap;
use crate::core::traits::{BaseElement, TableKind};
use crate::dialect::Vendor;

/// Index of a table within its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

impl TableId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A navigable foreign-key pointer held by a single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    /// Referenced table.
    pub target: TableId,
    /// Column of the owning table holding the key.
    pub key_column: String,
    /// Column of the target table it refers to.
    pub ref_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Camel-case member name, unique within the table.
    pub identifier: String,
    /// 1-based.
    pub position: usize,
    pub jdbc_type: i32,
    pub type_name: String,
    pub nullable: bool,
    pub size: i32,
    pub decimal_digits: i32,
    pub is_autoincrement: bool,
    pub is_primary_key: bool,
    /// Owning table (back-reference).
    pub table: TableId,
    pub key_ref: Option<KeyRef>,
}

impl BaseElement for Column {
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

    fn size(&self) -> i32 {
        self.size
    }

    fn decimal_digits(&self) -> i32 {
        self.decimal_digits
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: Option<String>,
    /// Key columns in this table, in key order.
    pub columns: Vec<String>,
    pub ref_table: String,
    /// Referenced columns; the target's primary key once resolved.
    pub ref_columns: Vec<String>,
    /// Set by resolution; `None` when the target is not part of the schema.
    pub target: Option<TableId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub id: TableId,
    /// Name in the database's own casing.
    pub name: String,
    /// Pascal-case type name, unique within the schema.
    pub identifier: String,
    pub kind: TableKind,
    /// Ordered by position.
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Tables with a foreign key to this one, in schema order.
    pub referenced_by: Vec<TableId>,
}

impl Table {
    /// Column by database name or derived identifier.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.identifier == name))
    }

    pub fn is_view(&self) -> bool {
        self.kind == TableKind::View
    }

    /// Columns holding a navigable single-column foreign key.
    pub fn key_refs(&self) -> impl Iterator<Item = (&Column, &KeyRef)> {
        self.columns
            .iter()
            .filter_map(|c| c.key_ref.as_ref().map(|k| (c, k)))
    }
}

/// Tables, columns and keys of one database schema, built from one
/// [`DbConfig`]. Immutable once built.
#[derive(Debug)]
pub struct Schema {
    name: String,
    config: DbConfig,
    vendor: Vendor,
    tables: Vec<Table>,
    by_name: HashMap<String, TableId>,
    identifiers: IdentifierMap,
}

impl Schema {
    /// Database schema name the tables were read from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Tables in database order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Table by id; `None` for an id handed out by another schema.
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.0)
    }

    /// Table by database name or derived identifier.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.by_name
            .get(name)
            .or_else(|| {
                self.identifiers
                    .original(name)
                    .and_then(|original| self.by_name.get(original))
            })
            .and_then(|id| self.table(*id))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Derived identifier of a database table name.
    pub fn identifier_name(&self, original: &str) -> Option<&str> {
        self.identifiers.identifier(original)
    }

    /// Database table name of a derived identifier.
    pub fn original_name(&self, identifier: &str) -> Option<&str> {
        self.identifiers.original(identifier)
    }

    pub fn identifiers(&self) -> &IdentifierMap {
        &self.identifiers
    }
}

/// Second pass: point every foreign key at its target table, fill implicit
/// referenced columns from the target's primary key, attach a [`KeyRef`] to
/// single-column keys and record inbound references.
fn resolve_foreign_keys(tables: &mut [Table], by_name: &HashMap<String, TableId>) {
    let lookup = |name: &str| -> Option<TableId> {
        by_name.get(name).copied().or_else(|| {
            by_name
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, id)| *id)
                .min()
        })
    };

    struct Resolution {
        table: usize,
        fk: usize,
        target: TableId,
        ref_columns: Vec<String>,
    }

    let mut resolutions = Vec::new();
    for table in tables.iter() {
        for (fk_index, fk) in table.foreign_keys.iter().enumerate() {
            let Some(target) = lookup(&fk.ref_table) else {
                warn!(
                    "Foreign key {} of {} references unknown table {}",
                    fk.name.as_deref().unwrap_or("<unnamed>"),
                    table.name,
                    fk.ref_table
                );
                continue;
            };
            let ref_columns = if fk.ref_columns.is_empty() {
                tables[target.0].primary_key.clone()
            } else {
                fk.ref_columns.clone()
            };
            resolutions.push(Resolution {
                table: table.id.0,
                fk: fk_index,
                target,
                ref_columns,
            });
        }
    }

    for r in resolutions {
        let owner = TableId(r.table);
        let table = &mut tables[r.table];
        let fk = &mut table.foreign_keys[r.fk];
        fk.target = Some(r.target);
        fk.ref_columns = r.ref_columns;

        if let ([key_column], [ref_column]) = (fk.columns.as_slice(), fk.ref_columns.as_slice()) {
            let key_ref = KeyRef {
                target: r.target,
                key_column: key_column.clone(),
                ref_column: ref_column.clone(),
            };
            if let Some(column) = table.columns.iter_mut().find(|c| c.name == key_ref.key_column) {
                column.key_ref = Some(key_ref);
            }
        }

        let referenced_by = &mut tables[r.target.0].referenced_by;
        if !referenced_by.contains(&owner) {
            referenced_by.push(owner);
        }
    }

    for table in tables.iter_mut() {
        table.referenced_by.sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jdbc;

    fn make_test_column(table: TableId, name: &str, position: usize) -> Column {
        Column {
            name: name.to_string(),
            identifier: name.to_string(),
            position,
            jdbc_type: jdbc::INTEGER,
            type_name: "INTEGER".to_string(),
            nullable: true,
            size: 0,
            decimal_digits: 0,
            is_autoincrement: false,
            is_primary_key: false,
            table,
            key_ref: None,
        }
    }

    fn make_test_table(id: usize, name: &str, columns: &[&str]) -> Table {
        let table_id = TableId(id);
        Table {
            id: table_id,
            name: name.to_string(),
            identifier: name.to_string(),
            kind: TableKind::Table,
            columns: columns
                .iter()
                .enumerate()
                .map(|(i, c)| make_test_column(table_id, c, i + 1))
                .collect(),
            primary_key: vec![columns[0].to_string()],
            foreign_keys: Vec::new(),
            referenced_by: Vec::new(),
        }
    }

    #[test]
    fn test_forward_reference_resolves() {
        // pet is listed before owner but references it.
        let mut pet = make_test_table(0, "pet", &["id", "owner_id"]);
        pet.foreign_keys.push(ForeignKey {
            name: None,
            columns: vec!["owner_id".to_string()],
            ref_table: "owner".to_string(),
            ref_columns: Vec::new(),
            target: None,
        });
        let owner = make_test_table(1, "owner", &["id", "name"]);
        let mut tables = vec![pet, owner];
        let by_name: HashMap<_, _> = tables.iter().map(|t| (t.name.clone(), t.id)).collect();

        resolve_foreign_keys(&mut tables, &by_name);

        let fk = &tables[0].foreign_keys[0];
        assert_eq!(fk.target, Some(TableId(1)));
        assert_eq!(fk.ref_columns, vec!["id"]);
        assert_eq!(
            tables[0].columns[1].key_ref,
            Some(KeyRef {
                target: TableId(1),
                key_column: "owner_id".to_string(),
                ref_column: "id".to_string(),
            })
        );
        assert_eq!(tables[1].referenced_by, vec![TableId(0)]);
        assert_eq!(tables[0].key_refs().count(), 1);
    }

    #[test]
    fn test_composite_key_has_no_key_ref() {
        let mut line = make_test_table(0, "line", &["id", "order_id", "order_rev"]);
        line.foreign_keys.push(ForeignKey {
            name: Some("fk_line_order".to_string()),
            columns: vec!["order_id".to_string(), "order_rev".to_string()],
            ref_table: "ORDERS".to_string(),
            ref_columns: vec!["id".to_string(), "rev".to_string()],
            target: None,
        });
        let orders = make_test_table(1, "orders", &["id", "rev"]);
        let mut tables = vec![line, orders];
        let by_name: HashMap<_, _> = tables.iter().map(|t| (t.name.clone(), t.id)).collect();

        resolve_foreign_keys(&mut tables, &by_name);

        assert_eq!(tables[0].foreign_keys[0].target, Some(TableId(1)));
        assert!(tables[0].columns.iter().all(|c| c.key_ref.is_none()));
    }

    #[test]
    fn test_unknown_target_left_unresolved() {
        let mut pet = make_test_table(0, "pet", &["id", "vet_id"]);
        pet.foreign_keys.push(ForeignKey {
            name: None,
            columns: vec!["vet_id".to_string()],
            ref_table: "vet".to_string(),
            ref_columns: vec!["id".to_string()],
            target: None,
        });
        let mut tables = vec![pet];
        let by_name: HashMap<_, _> = tables.iter().map(|t| (t.name.clone(), t.id)).collect();

        resolve_foreign_keys(&mut tables, &by_name);

        assert_eq!(tables[0].foreign_keys[0].target, None);
        assert!(tables[0].columns[1].key_ref.is_none());
    }

    #[test]
    fn test_column_lookup_by_identifier() {
        let mut table = make_test_table(0, "pet", &["id", "owner_id"]);
        table.columns[1].identifier = "ownerId".to_string();
        assert_eq!(table.column("owner_id").map(|c| c.position), Some(2));
        assert_eq!(table.column("ownerId").map(|c| c.position), Some(2));
        assert!(table.column("missing").is_none());
    }
}

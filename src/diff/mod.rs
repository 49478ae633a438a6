// src/diff/mod.rs

//! Comparing two schema models produces an ordered list of typed [`Change`]
//! records. This module never talks to a database directly; the only
//! database interaction the diff engine supports is the optional
//! [`column::DefaultEquivalence`] probe threaded through [`DiffOptions`].

mod change;
mod check;
mod column;
mod foreign_key;
mod index;

pub use change::{Change, ChangeKind};
pub use column::DefaultEquivalence;

use crate::schema::{Realm, Schema, Table};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("schema {0:?} has no counterpart to diff against")]
    NotExist(String),

    #[error("column {column:?} changes its generated expression; only dropping one is supported")]
    GeneratedExpressionNotSupported { column: String },
}

pub type DiffResult<T> = Result<T, DiffError>;

/// A prototype used to filter out change kinds the caller doesn't want to
/// see, matched by discriminant only (values in the prototype are ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeProto {
    AddTable,
    DropTable,
    ModifyTable,
    AddColumn,
    DropColumn,
    ModifyColumn,
    AddIndex,
    DropIndex,
    ModifyIndex,
    AddForeignKey,
    DropForeignKey,
    ModifyForeignKey,
    AddCheck,
    DropCheck,
    ModifyCheck,
}

fn discriminant_of(c: &Change) -> ChangeProto {
    use Change::*;
    match c {
        AddTable { .. } => ChangeProto::AddTable,
        DropTable { .. } => ChangeProto::DropTable,
        ModifyTable { .. } => ChangeProto::ModifyTable,
        AddColumn { .. } => ChangeProto::AddColumn,
        DropColumn { .. } => ChangeProto::DropColumn,
        ModifyColumn { .. } => ChangeProto::ModifyColumn,
        AddIndex { .. } | AddPrimaryKey { .. } => ChangeProto::AddIndex,
        DropIndex { .. } | DropPrimaryKey { .. } => ChangeProto::DropIndex,
        ModifyIndex { .. } | ModifyPrimaryKey { .. } => ChangeProto::ModifyIndex,
        AddForeignKey { .. } => ChangeProto::AddForeignKey,
        DropForeignKey { .. } => ChangeProto::DropForeignKey,
        ModifyForeignKey { .. } => ChangeProto::ModifyForeignKey,
        AddCheck { .. } => ChangeProto::AddCheck,
        DropCheck { .. } => ChangeProto::DropCheck,
        ModifyCheck { .. } => ChangeProto::ModifyCheck,
        _ => ChangeProto::ModifyTable, // never filtered; placeholder bucket
    }
}

#[derive(Default)]
pub struct DiffOptions<'a> {
    pub skip_changes: Vec<ChangeProto>,
    pub default_probe: Option<&'a dyn DefaultEquivalence>,
    /// An auto-generated-index-name predicate supplied by the dialect;
    /// defaults to "never auto-generated" when absent.
    pub is_auto_index_name: Option<&'a dyn Fn(&str) -> bool>,
}

impl<'a> DiffOptions<'a> {
    fn allows(&self, c: &Change) -> bool {
        !self.skip_changes.contains(&discriminant_of(c))
    }

    fn auto_name(&self, name: &str) -> bool {
        self.is_auto_index_name.map(|f| f(name)).unwrap_or(false)
    }
}

pub fn realm_diff(from: &Realm, to: &Realm, opts: &DiffOptions) -> DiffResult<Vec<Change>> {
    let mut changes = Vec::new();

    for to_schema in &to.schemas {
        if from.schema(&to_schema.name).is_none() {
            changes.push(Change::AddSchema { name: to_schema.name.clone() });
        }
    }
    for from_schema in &from.schemas {
        if to.schema(&from_schema.name).is_none() {
            changes.push(Change::DropSchema { name: from_schema.name.clone() });
        }
    }
    for from_schema in &from.schemas {
        if let Some(to_schema) = to.schema(&from_schema.name) {
            let sub = schema_diff(from_schema, to_schema, opts)?;
            if !sub.is_empty() {
                changes.push(Change::ModifySchema { name: from_schema.name.clone(), changes: sub });
            }
        }
    }

    Ok(changes.into_iter().filter(|c| opts.allows(c)).collect())
}

pub fn schema_diff(from: &Schema, to: &Schema, opts: &DiffOptions) -> DiffResult<Vec<Change>> {
    let mut changes = Vec::new();

    for to_table in &to.tables {
        if from.table(&to_table.name).is_none() {
            changes.push(Change::AddTable { table: to_table.clone() });
        }
    }
    for from_table in &from.tables {
        if to.table(&from_table.name).is_none() {
            changes.push(Change::DropTable { table: from_table.clone() });
        }
    }
    for from_table in &from.tables {
        if let Some(to_table) = to.table(&from_table.name) {
            let sub = table_diff(from_table, to_table, opts)?;
            if !sub.is_empty() {
                changes.push(Change::ModifyTable { name: from_table.name.clone(), changes: sub });
            }
        }
    }

    Ok(changes.into_iter().filter(|c| opts.allows(c)).collect())
}

/// Diffs one table. Ordering within the result follows §4.D step 6:
/// drops first (indexes before the columns they touch), then
/// modify-foreign-key split into drop+add, then additions.
pub fn table_diff(from: &Table, to: &Table, opts: &DiffOptions) -> DiffResult<Vec<Change>> {
    let mut drops = Vec::new();
    let mut modifies = Vec::new();
    let mut adds = Vec::new();

    // Indexes (including dropped ones) before columns, per the ordering rule.
    for (f, t) in index::pair_indexes(&from.indexes, &to.indexes, |n| opts.auto_name(n)) {
        match (f, t) {
            (Some(f), None) => drops.push(Change::DropIndex { index: f.clone() }),
            (None, Some(t)) => adds.push(Change::AddIndex { index: t.clone() }),
            (Some(f), Some(t)) => {
                let kind = index::diff_index(f, t);
                if !kind.is_empty() {
                    modifies.push(Change::ModifyIndex { from: f.clone(), to: t.clone(), kind });
                }
            }
            (None, None) => unreachable!(),
        }
    }

    match (&from.primary_key, &to.primary_key) {
        (Some(f), None) => drops.push(Change::DropPrimaryKey { index: f.clone() }),
        (None, Some(t)) => adds.push(Change::AddPrimaryKey { index: t.clone() }),
        (Some(f), Some(t)) => {
            let kind = index::diff_index(f, t);
            if !kind.is_empty() {
                modifies.push(Change::ModifyPrimaryKey { from: f.clone(), to: t.clone(), kind });
            }
        }
        (None, None) => {}
    }

    for to_col in &to.columns {
        if from.column(&to_col.name).is_none() {
            adds.push(Change::AddColumn { column: to_col.clone() });
        }
    }
    for from_col in &from.columns {
        if to.column(&from_col.name).is_none() {
            drops.push(Change::DropColumn { column: from_col.clone() });
        }
    }
    for from_col in &from.columns {
        if let Some(to_col) = to.column(&from_col.name) {
            if let Some(change) = column::diff_column(from_col, to_col, opts.default_probe)? {
                modifies.push(change);
            }
        }
    }

    // Foreign keys: any difference is split into drop+add to support
    // reference-table changes cleanly (§4.D step 6).
    for from_fk in &from.foreign_keys {
        match to.foreign_keys.iter().find(|t| t.symbol == from_fk.symbol) {
            None => drops.push(Change::DropForeignKey { fk: from_fk.clone() }),
            Some(to_fk) => {
                let kind = foreign_key::diff_foreign_key(from_fk, to_fk);
                if !kind.is_empty() {
                    drops.push(Change::DropForeignKey { fk: from_fk.clone() });
                    adds.push(Change::AddForeignKey { fk: to_fk.clone() });
                }
            }
        }
    }
    for to_fk in &to.foreign_keys {
        if !from.foreign_keys.iter().any(|f| f.symbol == to_fk.symbol) {
            adds.push(Change::AddForeignKey { fk: to_fk.clone() });
        }
    }

    for (f, t) in check::pair_checks(&from.checks, &to.checks) {
        match (f, t) {
            (Some(f), None) => drops.push(Change::DropCheck { check: f.clone() }),
            (None, Some(t)) => adds.push(Change::AddCheck { check: t.clone() }),
            (Some(f), Some(t)) => {
                if !check::checks_equal(f, t) {
                    modifies.push(Change::ModifyCheck { from: f.clone(), to: t.clone() });
                }
            }
            (None, None) => unreachable!(),
        }
    }

    let mut changes = Vec::with_capacity(drops.len() + modifies.len() + adds.len());
    changes.extend(drops);
    changes.extend(modifies);
    changes.extend(adds);

    Ok(changes.into_iter().filter(|c| opts.allows(c)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Identity, Type};

    #[test]
    fn empty_to_empty_is_empty_diff() {
        let from = Realm::new();
        let to = Realm::new();
        let changes = realm_diff(&from, &to, &DiffOptions::default()).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn diff_is_idempotent_for_identical_models() {
        let mut schema = Schema::new("public");
        let mut table = Table::new("users");
        table.add_column(Column::new("id", Type::Integer { bits: 64, unsigned: false }).not_null());
        schema.add_table(table);
        let mut realm_a = Realm::new();
        realm_a.add_schema(schema.clone());
        let mut realm_b = Realm::new();
        realm_b.add_schema(schema);

        let changes = realm_diff(&realm_a, &realm_b, &DiffOptions::default()).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn adding_a_table_produces_one_add_table_change() {
        let from = Schema::new("public");
        let mut to = Schema::new("public");
        let mut users = Table::new("users");
        users.add_column(
            Column::new("id", Type::Integer { bits: 64, unsigned: false }).not_null(),
        );
        users.add_column(Column::new("name", Type::String { size: Some(255) }));
        to.add_table(users);

        let changes = schema_diff(&from, &to, &DiffOptions::default()).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], Change::AddTable { .. }));
    }

    #[test]
    fn identity_start_change_yields_single_modify_column() {
        let mut from = Table::new("users");
        from.add_column(
            Column::new("id", Type::Integer { bits: 64, unsigned: false }).with_identity(Identity::default()),
        );
        let mut to = Table::new("users");
        to.add_column(
            Column::new("id", Type::Integer { bits: 64, unsigned: false }).with_identity(Identity {
                start: 100,
                ..Identity::default()
            }),
        );

        let changes = table_diff(&from, &to, &DiffOptions::default()).unwrap();
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::ModifyColumn { kind, .. } => assert_eq!(*kind, ChangeKind::ATTR),
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[test]
    fn adding_a_generated_expression_fails_the_table_diff() {
        let mut from = Table::new("users");
        from.add_column(Column::new("full_name", Type::String { size: Some(255) }));
        let mut to = Table::new("users");
        let mut full_name = Column::new("full_name", Type::String { size: Some(255) });
        full_name.generated_expr = Some("first || ' ' || last".into());
        to.add_column(full_name);

        let result = table_diff(&from, &to, &DiffOptions::default());
        assert!(matches!(result, Err(DiffError::GeneratedExpressionNotSupported { .. })));
    }

    #[test]
    fn skip_changes_filters_by_discriminant() {
        let from = Schema::new("public");
        let mut to = Schema::new("public");
        to.add_table(Table::new("users"));

        let opts = DiffOptions {
            skip_changes: vec![ChangeProto::AddTable],
            ..Default::default()
        };
        let changes = schema_diff(&from, &to, &opts).unwrap();
        assert!(changes.is_empty());
    }
}

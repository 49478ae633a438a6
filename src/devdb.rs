// src/devdb.rs

//! Normalizes a user-authored desired schema into canonical form by
//! round-tripping it through a scratch sandbox database: apply the
//! synthesized create statements, then re-inspect so downstream diffs
//! compare apples to apples (`varchar` vs `character varying`, default
//! literals normalized by the dialect, etc).

use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use crate::diff::Change;
use crate::inspect::{InspectError, InspectOptions, Inspector};
use crate::migrate::{Driver, ExecError};
use crate::plan::{plan, PlanError, PlanOptions};
use crate::schema::{Attr, Comment, Realm};
use crate::sqlgen::DialectBuilder;

#[derive(Debug, Error)]
pub enum DevDbError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Inspect(#[from] InspectError),
}

pub type DevDbResult<T> = Result<T, DevDbError>;

/// A sandbox connection capable of snapshotting and restoring itself, used
/// to keep the normalization round-trip from leaving residue behind.
pub trait Sandbox {
    fn snapshot(&mut self) -> DevDbResult<Vec<u8>>;
    fn restore(&mut self, snapshot: &[u8]) -> DevDbResult<()>;
}

/// Source-position metadata the caller wants re-attached to the
/// normalized schema, keyed by `(kind, qualified_name)` so it survives the
/// create/inspect round-trip even though the re-inspected objects are
/// freshly constructed values with no memory of where they came from.
pub type SourcePositions = HashMap<(&'static str, String), (String, u32, u32)>;

fn qualified_name(schema: &str, name: &str) -> String {
    format!("{schema}.{name}")
}

/// Re-propagates `positions` onto `realm`'s attribute lists by keying on
/// `(kind, qualified-name)`; objects with no matching entry are untouched.
fn reattach_positions(realm: &mut Realm, positions: &SourcePositions) {
    for schema in &mut realm.schemas {
        for table in &mut schema.tables {
            if let Some((file, line, col)) = positions.get(&("table", qualified_name(&schema.name, &table.name))) {
                table.attrs.replace_or_append(Attr::Comment(Comment(format!("{file}:{line}:{col}"))));
            }
        }
        for view in &mut schema.views {
            if let Some((file, line, col)) = positions.get(&("view", qualified_name(&schema.name, &view.name))) {
                view.attrs.replace_or_append(Attr::Comment(Comment(format!("{file}:{line}:{col}"))));
            }
        }
    }
}

/// Normalizes `desired` by applying it to `sandbox`/`driver` and
/// re-inspecting with `inspector`. Normalization runs against `driver`
/// directly rather than through an [`crate::migrate::Executor`] -- this is
/// a throwaway sandbox operation, not a tracked migration, so there is no
/// revision to record. The sandbox is snapshotted before and restored
/// after, so the caller's connection is left exactly as it found it
/// regardless of success or failure.
pub fn normalize(
    desired: &Realm,
    driver: &mut dyn Driver,
    sandbox: &mut dyn Sandbox,
    inspector: &dyn Inspector,
    dialect: &dyn DialectBuilder,
    positions: &SourcePositions,
) -> DevDbResult<Realm> {
    let snapshot = sandbox.snapshot()?;
    let result = (|| {
        let mut changes = Vec::new();
        for schema in &desired.schemas {
            changes.push(Change::AddSchema { name: schema.name.clone() });
            for table in &schema.tables {
                changes.push(Change::AddTable { table: table.clone() });
            }
        }

        let rendered = plan(changes, &PlanOptions { dialect, schema_scope: None })?;
        info!(statements = rendered.changes.len(), "normalizing desired schema against sandbox");

        for change in &rendered.changes {
            driver.exec(&change.cmd)?;
        }

        let mut realm = inspector.inspect_realm(&InspectOptions::default())?;
        reattach_positions(&mut realm, positions);
        Ok(realm)
    })();

    sandbox.restore(&snapshot)?;
    result
}

/// Lists every table/view name present in `realm`, qualified by schema.
/// Callers use this to confirm a normalization round-trip didn't silently
/// drop anything.
pub fn object_names(realm: &Realm) -> Vec<String> {
    let mut names = Vec::new();
    for schema in &realm.schemas {
        for table in &schema.tables {
            names.push(qualified_name(&schema.name, &table.name));
        }
        for view in &schema.views {
            names.push(qualified_name(&schema.name, &view.name));
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, Table};

    #[test]
    fn object_names_lists_tables_and_views_qualified_by_schema() {
        let mut realm = Realm::new();
        let mut schema = Schema::new("public");
        schema.add_table(Table::new("users"));
        schema.add_view(crate::schema::View::new("active_users", "SELECT 1"));
        realm.add_schema(schema);

        let mut names = object_names(&realm);
        names.sort();
        assert_eq!(names, vec!["public.active_users".to_string(), "public.users".to_string()]);
    }

    #[test]
    fn reattach_positions_only_touches_matching_entries() {
        let mut realm = Realm::new();
        let mut schema = Schema::new("public");
        schema.add_table(Table::new("users"));
        realm.add_schema(schema);

        let mut positions = SourcePositions::new();
        positions.insert(("table", "public.users".to_string()), ("schema.hcl".to_string(), 3, 1));
        reattach_positions(&mut realm, &positions);

        let table = realm.schema("public").unwrap().table("users").unwrap();
        assert_eq!(table.attrs.comment(), Some("schema.hcl:3:1"));
    }
}

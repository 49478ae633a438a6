// src/plan.rs

//! Turns an unordered change list into an ordered, executable [`Plan`].
//!
//! The hard part is foreign-key cycles: two tables that reference each
//! other can't both be created in one `CREATE TABLE` each, so a table
//! caught in a cycle is created without its cyclic foreign keys, and the
//! keys are added back afterward via a trailing `ModifyTable`. Cycle
//! detection runs Tarjan's strongly-connected-components algorithm over a
//! table-level dependency graph built for this plan; nothing in `schema` or
//! `diff` needs to know about it.

use crate::diff::Change;
use crate::schema::Table;
use crate::sqlgen::{DialectBuilder, Rendered, RenameHint, RenameParser};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan is scoped to schema {scope:?}, but change touches {found:?}")]
    ScopeViolation { scope: String, found: String },

    #[error("rename hint {hint} does not match a drop+add pair in the change list")]
    RenameNotFound { hint: String },
}

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanChange {
    pub cmd: String,
    pub reverse: Option<String>,
    pub comment: Option<String>,
    pub transactional: bool,
    pub source: Change,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub changes: Vec<PlanChange>,
    pub reversible: bool,
    pub transactional: bool,
}

pub struct PlanOptions<'a> {
    pub dialect: &'a dyn DialectBuilder,
    /// When set, any top-level change outside this schema fails the plan
    /// with `ScopeViolation` (§4.E step 6).
    pub schema_scope: Option<&'a str>,
}

pub fn plan(changes: Vec<Change>, opts: &PlanOptions) -> PlanResult<Plan> {
    let mut schema_level = Vec::new();
    let mut rest = Vec::new();

    for change in changes {
        match change {
            Change::AddSchema { ref name } | Change::DropSchema { ref name } => {
                check_scope(opts, name)?;
                schema_level.push(change);
            }
            Change::ModifySchema { ref name, changes: nested } => {
                check_scope(opts, name)?;
                // The wrapper itself carries no statement; its nested
                // table-level changes join the main dependency-ordering
                // pass below as if they were top-level.
                rest.extend(nested);
            }
            other => rest.push(other),
        }
    }

    let mut rendered = Vec::new();
    for change in schema_level {
        render_into(&mut rendered, change, None, opts)?;
    }

    let (adds, drops, passthrough) = partition_table_changes(rest);

    let add_order = order_by_dependency(&adds, Direction::CreateFirst);
    for item in add_order {
        match item {
            OrderedItem::Single(table) => {
                render_into(&mut rendered, Change::AddTable { table: table.clone() }, None, opts)?;
            }
            OrderedItem::Cycle(tables, cyclic_fks) => {
                for table in &tables {
                    let stripped = strip_foreign_keys(table, &cyclic_fks);
                    render_into(&mut rendered, Change::AddTable { table: stripped }, None, opts)?;
                }
                for (table_name, fk) in cyclic_fks {
                    let follow_up = Change::ModifyTable {
                        name: table_name,
                        changes: vec![Change::AddForeignKey { fk }],
                    };
                    render_into(&mut rendered, follow_up, None, opts)?;
                }
            }
        }
    }

    let drop_order = order_by_dependency(&drops, Direction::DropFirst);
    for item in drop_order {
        match item {
            OrderedItem::Single(table) => {
                render_into(&mut rendered, Change::DropTable { table: table.clone() }, None, opts)?;
            }
            OrderedItem::Cycle(tables, cyclic_fks) => {
                for (table_name, fk) in &cyclic_fks {
                    let follow_up = Change::ModifyTable {
                        name: table_name.clone(),
                        changes: vec![Change::DropForeignKey { fk: fk.clone() }],
                    };
                    render_into(&mut rendered, follow_up, None, opts)?;
                }
                for table in &tables {
                    render_into(&mut rendered, Change::DropTable { table: table.clone() }, None, opts)?;
                }
            }
        }
    }

    for change in passthrough {
        render_into(&mut rendered, change, None, opts)?;
    }

    let reversible = rendered.iter().all(|c| c.reverse.is_some());
    let transactional = rendered.iter().all(|c| c.transactional);

    Ok(Plan { changes: rendered, reversible, transactional })
}

/// Lets a dialect's raw-SQL parser fold a rename back into a diff-derived
/// change list (§4.E step 4). The diff engine always reports a rename as a
/// drop+add pair since it never sees the original migration text; when a
/// dialect's [`RenameParser`] recognizes `stmt` as a rename, the matching
/// pair is collapsed into the corresponding `Rename*` change. Returns
/// `changes` unchanged when the parser doesn't recognize `stmt` at all, and
/// an error when it does but the hinted pair isn't actually present.
pub fn recognize_rename(
    parser: &dyn RenameParser,
    stmt: &str,
    changes: Vec<Change>,
) -> PlanResult<Vec<Change>> {
    match parser.parse_rename(stmt) {
        None => Ok(changes),
        Some(RenameHint::Column { table, from, to }) => collapse_column_rename(changes, &table, &from, &to),
        Some(RenameHint::Index { from, to }) => collapse_index_rename(changes, &from, &to),
        Some(RenameHint::Table { from, to }) => collapse_table_rename(changes, &from, &to),
    }
}

fn replace_drop_add_pair(
    changes: &mut Vec<Change>,
    is_drop: impl Fn(&Change) -> bool,
    is_add: impl Fn(&Change) -> bool,
    replacement: Change,
) -> bool {
    let drop_idx = changes.iter().position(|c| is_drop(c));
    let add_idx = changes.iter().position(|c| is_add(c));
    match (drop_idx, add_idx) {
        (Some(d), Some(a)) => {
            let insert_at = d.min(a);
            let (hi, lo) = if d > a { (d, a) } else { (a, d) };
            changes.remove(hi);
            changes.remove(lo);
            changes.insert(insert_at, replacement);
            true
        }
        _ => false,
    }
}

fn collapse_column_rename(mut changes: Vec<Change>, table: &str, from: &str, to: &str) -> PlanResult<Vec<Change>> {
    let mut collapsed = false;
    for change in &mut changes {
        if let Change::ModifyTable { name, changes: inner } = change {
            if name == table {
                collapsed = replace_drop_add_pair(
                    inner,
                    |c| matches!(c, Change::DropColumn { column } if column.name == from),
                    |c| matches!(c, Change::AddColumn { column } if column.name == to),
                    Change::RenameColumn { from: from.to_string(), to: to.to_string() },
                );
            }
        }
    }
    if collapsed {
        Ok(changes)
    } else {
        Err(PlanError::RenameNotFound { hint: format!("column {table}.{from} -> {to}") })
    }
}

fn collapse_index_rename(mut changes: Vec<Change>, from: &str, to: &str) -> PlanResult<Vec<Change>> {
    let mut collapsed = false;
    for change in &mut changes {
        if let Change::ModifyTable { changes: inner, .. } = change {
            if replace_drop_add_pair(
                inner,
                |c| matches!(c, Change::DropIndex { index } if index.name == from),
                |c| matches!(c, Change::AddIndex { index } if index.name == to),
                Change::RenameIndex { from: from.to_string(), to: to.to_string() },
            ) {
                collapsed = true;
            }
        }
    }
    if collapsed {
        Ok(changes)
    } else {
        Err(PlanError::RenameNotFound { hint: format!("index {from} -> {to}") })
    }
}

fn collapse_table_rename(mut changes: Vec<Change>, from: &str, to: &str) -> PlanResult<Vec<Change>> {
    let collapsed = replace_drop_add_pair(
        &mut changes,
        |c| matches!(c, Change::DropTable { table } if table.name == from),
        |c| matches!(c, Change::AddTable { table } if table.name == to),
        Change::RenameTable { from: from.to_string(), to: to.to_string() },
    );
    if collapsed {
        Ok(changes)
    } else {
        Err(PlanError::RenameNotFound { hint: format!("table {from} -> {to}") })
    }
}

fn check_scope(opts: &PlanOptions, name: &str) -> PlanResult<()> {
    if let Some(scope) = opts.schema_scope {
        if scope != name {
            return Err(PlanError::ScopeViolation {
                scope: scope.to_string(),
                found: name.to_string(),
            });
        }
    }
    Ok(())
}

fn render_into(
    out: &mut Vec<PlanChange>,
    change: Change,
    table: Option<&str>,
    opts: &PlanOptions,
) -> PlanResult<()> {
    // `ModifyTable`/`ModifySchema` wrap one or more sub-changes; each
    // renders independently against the same table-name context.
    match &change {
        Change::ModifyTable { name, changes } => {
            for sub in changes {
                if let Some(Rendered { cmd, reverse, comment, transactional }) =
                    opts.dialect.render(sub, Some(name))
                {
                    out.push(PlanChange { cmd, reverse, comment, transactional, source: sub.clone() });
                }
            }
            return Ok(());
        }
        Change::ModifySchema { changes, .. } => {
            for sub in changes {
                render_into(out, sub.clone(), table, opts)?;
            }
            return Ok(());
        }
        _ => {}
    }
    if let Some(Rendered { cmd, reverse, comment, transactional }) = opts.dialect.render(&change, table) {
        out.push(PlanChange { cmd, reverse, comment, transactional, source: change });
    }
    Ok(())
}

fn partition_table_changes(changes: Vec<Change>) -> (Vec<Table>, Vec<Table>, Vec<Change>) {
    let mut adds = Vec::new();
    let mut drops = Vec::new();
    let mut passthrough = Vec::new();

    for change in changes {
        match change {
            Change::AddTable { table } => adds.push(table),
            Change::DropTable { table } => drops.push(table),
            other => passthrough.push(other),
        }
    }
    (adds, drops, passthrough)
}

enum OrderedItem {
    Single(Table),
    /// A cyclic group: the tables with their cyclic FKs stripped, plus the
    /// `(table_name, fk)` pairs to add back afterward (or drop first, for
    /// the drop path).
    Cycle(Vec<Table>, Vec<(String, crate::schema::ForeignKey)>),
}

enum Direction {
    CreateFirst,
    DropFirst,
}

/// Orders a set of tables by their foreign-key dependencies using Tarjan's
/// SCC algorithm. An edge `child -> parent` means "parent must exist
/// before child" when creating; Tarjan emits completed SCCs in an order
/// where a node's dependencies are always emitted first, which is exactly
/// the create order. The drop order is the reverse.
fn order_by_dependency(tables: &[Table], direction: Direction) -> Vec<OrderedItem> {
    if tables.is_empty() {
        return Vec::new();
    }

    let index_of: HashMap<&str, usize> = tables.iter().enumerate().map(|(i, t)| (t.name.as_str(), i)).collect();
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
    for (i, table) in tables.iter().enumerate() {
        for fk in &table.foreign_keys {
            if let Some(&j) = index_of.get(fk.ref_table.as_str()) {
                edges[i].push(j);
            }
        }
    }

    let sccs = tarjan_scc(&edges);

    let mut items = Vec::new();
    for scc in sccs {
        if scc.len() == 1 && !edges[scc[0]].contains(&scc[0]) {
            items.push(OrderedItem::Single(tables[scc[0]].clone()));
            continue;
        }

        let members: std::collections::HashSet<usize> = scc.iter().copied().collect();
        let mut cyclic_fks = Vec::new();
        let group_tables: Vec<Table> = scc
            .iter()
            .map(|&i| {
                let table = &tables[i];
                for fk in &table.foreign_keys {
                    if let Some(&j) = index_of.get(fk.ref_table.as_str()) {
                        // A self-FK is always inline-safe: the table already
                        // exists by the time its own foreign key is checked,
                        // so it never needs stripping and re-adding.
                        if j != i && members.contains(&j) {
                            cyclic_fks.push((table.name.clone(), fk.clone()));
                        }
                    }
                }
                table.clone()
            })
            .collect();
        items.push(OrderedItem::Cycle(group_tables, cyclic_fks));
    }

    if matches!(direction, Direction::DropFirst) {
        items.reverse();
    }
    items
}

fn strip_foreign_keys(table: &Table, cyclic: &[(String, crate::schema::ForeignKey)]) -> Table {
    let mut stripped = table.clone();
    stripped.foreign_keys.retain(|fk| {
        !cyclic.iter().any(|(name, cyclic_fk)| name == &table.name && cyclic_fk.symbol == fk.symbol)
    });
    stripped
}

/// Classic iterative-recursion-free would be nicer, but the teacher's own
/// graph code (`transaction/planner.rs`) uses plain recursive helpers, and
/// table dependency graphs are never deep enough in practice to risk a
/// stack overflow.
fn tarjan_scc(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State {
        index: Vec<Option<usize>>,
        low_link: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next_index: usize,
        sccs: Vec<Vec<usize>>,
    }

    fn strongconnect(v: usize, edges: &[Vec<usize>], state: &mut State) {
        state.index[v] = Some(state.next_index);
        state.low_link[v] = state.next_index;
        state.next_index += 1;
        state.stack.push(v);
        state.on_stack[v] = true;

        for &w in &edges[v] {
            if state.index[w].is_none() {
                strongconnect(w, edges, state);
                state.low_link[v] = state.low_link[v].min(state.low_link[w]);
            } else if state.on_stack[w] {
                state.low_link[v] = state.low_link[v].min(state.index[w].unwrap());
            }
        }

        if state.low_link[v] == state.index[v].unwrap() {
            let mut component = Vec::new();
            loop {
                let w = state.stack.pop().unwrap();
                state.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            state.sccs.push(component);
        }
    }

    let n = edges.len();
    let mut state = State {
        index: vec![None; n],
        low_link: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next_index: 0,
        sccs: Vec::new(),
    };

    for v in 0..n {
        if state.index[v].is_none() {
            strongconnect(v, edges, &mut state);
        }
    }
    state.sccs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ForeignKey, Type};
    use crate::sqlgen::GenericDialect;

    fn table(name: &str) -> Table {
        let mut t = Table::new(name);
        t.add_column(Column::new("id", Type::Integer { bits: 64, unsigned: false }).not_null());
        t
    }

    #[test]
    fn independent_tables_both_created() {
        let dialect = GenericDialect;
        let opts = PlanOptions { dialect: &dialect, schema_scope: None };
        let changes = vec![
            Change::AddTable { table: table("a") },
            Change::AddTable { table: table("b") },
        ];
        let result = plan(changes, &opts).unwrap();
        assert_eq!(result.changes.len(), 2);
        assert!(result.reversible);
    }

    #[test]
    fn linear_dependency_creates_parent_first() {
        let dialect = GenericDialect;
        let opts = PlanOptions { dialect: &dialect, schema_scope: None };

        let parent = table("workplaces");
        let mut child = table("users");
        let mut fk = ForeignKey::new("fk_users_workplace", "workplaces");
        fk.columns = vec!["workplace_id".into()];
        fk.ref_columns = vec!["id".into()];
        child.foreign_keys.push(fk);

        let changes = vec![
            Change::AddTable { table: child },
            Change::AddTable { table: parent },
        ];
        let result = plan(changes, &opts).unwrap();
        let order: Vec<&str> = result
            .changes
            .iter()
            .filter_map(|c| match &c.source {
                Change::AddTable { table } => Some(table.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec!["workplaces", "users"]);
    }

    #[test]
    fn mutual_foreign_keys_split_into_stripped_create_plus_trailing_add() {
        let dialect = GenericDialect;
        let opts = PlanOptions { dialect: &dialect, schema_scope: None };

        let mut a = table("a");
        let mut fk_a = ForeignKey::new("fk_a_b", "b");
        fk_a.columns = vec!["b_id".into()];
        fk_a.ref_columns = vec!["id".into()];
        a.foreign_keys.push(fk_a);

        let mut b = table("b");
        let mut fk_b = ForeignKey::new("fk_b_a", "a");
        fk_b.columns = vec!["a_id".into()];
        fk_b.ref_columns = vec!["id".into()];
        b.foreign_keys.push(fk_b);

        let changes = vec![Change::AddTable { table: a }, Change::AddTable { table: b }];
        let result = plan(changes, &opts).unwrap();

        let creates = result
            .changes
            .iter()
            .filter(|c| matches!(c.source, Change::AddTable { .. }))
            .count();
        let trailing_fks = result
            .changes
            .iter()
            .filter(|c| matches!(c.source, Change::AddForeignKey { .. }))
            .count();
        assert_eq!(creates, 2);
        assert_eq!(trailing_fks, 2);
        // The trailing adds must come after both creates.
        let last_create = result
            .changes
            .iter()
            .rposition(|c| matches!(c.source, Change::AddTable { .. }))
            .unwrap();
        let first_fk = result
            .changes
            .iter()
            .position(|c| matches!(c.source, Change::AddForeignKey { .. }))
            .unwrap();
        assert!(first_fk > last_create);
    }

    #[test]
    fn self_referential_fk_stays_inline_in_a_cyclic_group() {
        let dialect = GenericDialect;
        let opts = PlanOptions { dialect: &dialect, schema_scope: None };

        let mut users = table("users");
        let mut fk_users_workplace = ForeignKey::new("fk_users_workplace", "workplaces");
        fk_users_workplace.columns = vec!["workplace_id".into()];
        fk_users_workplace.ref_columns = vec!["id".into()];
        users.foreign_keys.push(fk_users_workplace);
        let mut fk_users_manager = ForeignKey::new("fk_users_manager", "users");
        fk_users_manager.columns = vec!["manager_id".into()];
        fk_users_manager.ref_columns = vec!["id".into()];
        users.foreign_keys.push(fk_users_manager);

        let mut workplaces = table("workplaces");
        let mut fk_workplaces_owner = ForeignKey::new("fk_workplaces_owner", "users");
        fk_workplaces_owner.columns = vec!["owner_id".into()];
        fk_workplaces_owner.ref_columns = vec!["id".into()];
        workplaces.foreign_keys.push(fk_workplaces_owner);

        let changes = vec![Change::AddTable { table: users }, Change::AddTable { table: workplaces }];
        let result = plan(changes, &opts).unwrap();

        assert_eq!(result.changes.len(), 4);

        let users_create = result
            .changes
            .iter()
            .find(|c| matches!(&c.source, Change::AddTable { table } if table.name == "users"))
            .unwrap();
        match &users_create.source {
            Change::AddTable { table } => {
                assert!(table.foreign_keys.iter().any(|fk| fk.symbol == "fk_users_manager"));
            }
            _ => unreachable!(),
        }

        let mut trailing_fks: Vec<_> = result
            .changes
            .iter()
            .filter_map(|c| match &c.source {
                Change::AddForeignKey { fk } => Some(fk.symbol.as_str()),
                _ => None,
            })
            .collect();
        trailing_fks.sort_unstable();
        assert_eq!(trailing_fks, vec!["fk_users_workplace", "fk_workplaces_owner"]);
    }

    #[test]
    fn scope_violation_rejects_cross_schema_top_level_change() {
        let dialect = GenericDialect;
        let opts = PlanOptions { dialect: &dialect, schema_scope: Some("public") };
        let changes = vec![Change::AddSchema { name: "other".into() }];
        assert!(matches!(plan(changes, &opts), Err(PlanError::ScopeViolation { .. })));
    }

    #[test]
    fn irreversible_change_flips_plan_reversible_flag() {
        let dialect = GenericDialect;
        let opts = PlanOptions { dialect: &dialect, schema_scope: None };
        let changes = vec![Change::DropTable { table: table("gone") }];
        let result = plan(changes, &opts).unwrap();
        assert!(!result.reversible);
    }

    struct FakeRenameParser;
    impl RenameParser for FakeRenameParser {
        fn parse_rename(&self, stmt: &str) -> Option<RenameHint> {
            if stmt == "ALTER TABLE t RENAME COLUMN a TO b" {
                Some(RenameHint::Column { table: "t".into(), from: "a".into(), to: "b".into() })
            } else {
                None
            }
        }
    }

    #[test]
    fn recognized_rename_collapses_drop_add_pair_into_rename_column() {
        let changes = vec![Change::ModifyTable {
            name: "t".into(),
            changes: vec![
                Change::DropColumn { column: Column::new("a", Type::Integer { bits: 64, unsigned: false }) },
                Change::AddColumn { column: Column::new("b", Type::Integer { bits: 64, unsigned: false }) },
            ],
        }];

        let result = recognize_rename(&FakeRenameParser, "ALTER TABLE t RENAME COLUMN a TO b", changes).unwrap();
        match &result[0] {
            Change::ModifyTable { changes, .. } => {
                assert_eq!(changes.len(), 1);
                assert!(matches!(&changes[0], Change::RenameColumn { from, to } if from == "a" && to == "b"));
            }
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_statement_leaves_changes_untouched() {
        let changes = vec![Change::AddTable { table: table("t") }];
        let result = recognize_rename(&FakeRenameParser, "CREATE TABLE t (id INT)", changes.clone()).unwrap();
        assert_eq!(result, changes);
    }

    #[test]
    fn rename_hint_without_a_matching_pair_is_an_error() {
        let changes = vec![Change::ModifyTable {
            name: "t".into(),
            changes: vec![Change::DropColumn {
                column: Column::new("a", Type::Integer { bits: 64, unsigned: false }),
            }],
        }];

        let result = recognize_rename(&FakeRenameParser, "ALTER TABLE t RENAME COLUMN a TO b", changes);
        assert!(matches!(result, Err(PlanError::RenameNotFound { .. })));
    }
}

// src/schema/table.rs

use super::attrs::AttrList;
use super::column::Column;
use super::foreign_key::ForeignKey;
use super::index::Index;

#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: Option<String>,
    pub expr: String,
    pub no_inherit: bool,
    pub attrs: AttrList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTime {
    Before,
    After,
    InsteadOf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    UpdateOf(Vec<String>),
    Delete,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerFor {
    Row,
    Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub name: String,
    pub time: TriggerTime,
    pub events: Vec<TriggerEvent>,
    pub for_each: TriggerFor,
    pub body: String,
    pub attrs: AttrList,
    pub deps: Vec<String>,
    pub refs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncArgMode {
    In,
    Out,
    InOut,
    Variadic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncArg {
    pub name: String,
    pub ty: super::types::Type,
    pub mode: FuncArgMode,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: String,
    pub args: Vec<FuncArg>,
    pub return_type: super::types::Type,
    pub body: String,
    pub language: String,
    pub attrs: AttrList,
    pub deps: Vec<String>,
    pub refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proc {
    pub name: String,
    pub args: Vec<FuncArg>,
    pub body: String,
    pub language: String,
    pub attrs: AttrList,
    pub deps: Vec<String>,
    pub refs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<Index>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub checks: Vec<Check>,
    pub triggers: Vec<Trigger>,
    pub attrs: AttrList,
    /// Objects this table depends on (parent tables of its FKs, etc.).
    pub deps: Vec<String>,
    /// Objects depending on this table (children whose FKs point here).
    pub refs: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn add_column(&mut self, column: Column) -> &mut Column {
        self.columns.push(column);
        self.columns.last_mut().unwrap()
    }

    pub fn add_columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn set_primary_key(mut self, index: Index) -> Self {
        self.primary_key = Some(index);
        self
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Adds a dependency on `target`, and if `target` is mutually tracked
    /// (the caller also holds the referenced table), records the inverse
    /// `refs` edge -- mirrors the `AddDeps`/`AddRefs` symmetric-edge
    /// protocol: callers that want the inverse recorded pass the target's
    /// `refs` list in directly.
    pub fn add_dep(&mut self, target: &str, target_refs: Option<&mut Vec<String>>) {
        if !self.deps.iter().any(|d| d == target) {
            self.deps.push(target.to_string());
        }
        if let Some(refs) = target_refs {
            if !refs.iter().any(|r| r == self.name.as_str()) {
                refs.push(self.name.clone());
            }
        }
    }

    pub fn remove_dep(&mut self, target: &str, target_refs: Option<&mut Vec<String>>) {
        self.deps.retain(|d| d != target);
        if let Some(refs) = target_refs {
            refs.retain(|r| r != self.name.as_str());
        }
    }
}

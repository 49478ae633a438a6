// src/schema/mod.rs

//! Dialect-neutral in-memory representation of database objects.
//!
//! A [`Realm`] owns a set of [`Schema`]s; a `Schema` owns ordered
//! collections of [`Table`], [`View`], [`Func`] and [`Proc`]. Children hold
//! their container's name rather than a pointer back to it -- cross-table
//! references (foreign keys, trigger targets) are resolved by name on
//! demand instead of through raw pointers, so the model never needs
//! `Rc`/`RefCell` to express what is conceptually a cyclic graph.

mod attrs;
mod column;
mod foreign_key;
mod index;
mod table;
mod types;
mod view;

pub use attrs::{Attr, AttrList, Charset, Collation, Comment};
pub use column::{Column, ColumnDefault, Identity, IdentityGeneration};
pub use foreign_key::{ForeignKey, ReferenceOption};
pub use index::{Index, IndexPart, IndexPartTarget};
pub use table::{Check, Func, FuncArg, FuncArgMode, Proc, Table, Trigger, TriggerEvent, TriggerFor, TriggerTime};
pub use types::Type;
pub use view::{CheckOption, View};

/// A connection's universe of schemas -- a "server" or "cluster" scope.
#[derive(Debug, Clone, Default)]
pub struct Realm {
    pub schemas: Vec<Schema>,
    pub attrs: AttrList,
}

impl Realm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a schema by name. Schema names are case-sensitive.
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.schemas.iter_mut().find(|s| s.name == name)
    }

    pub fn add_schema(&mut self, schema: Schema) -> &mut Schema {
        self.schemas.push(schema);
        self.schemas.last_mut().unwrap()
    }
}

/// A named database/namespace within a [`Realm`].
///
/// Name may be empty only for the "current schema" placeholder used when a
/// dialect has no notion of nested namespaces.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub funcs: Vec<Func>,
    pub procs: Vec<Proc>,
    pub attrs: AttrList,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn add_table(&mut self, table: Table) -> &mut Table {
        self.tables.push(table);
        self.tables.last_mut().unwrap()
    }

    pub fn add_view(&mut self, view: View) -> &mut View {
        self.views.push(view);
        self.views.last_mut().unwrap()
    }

    /// Find any object (table, view, func or proc) whose name matches `pred`.
    pub fn object(&self, pred: impl Fn(&str) -> bool) -> Option<ObjectRef<'_>> {
        if let Some(t) = self.tables.iter().find(|t| pred(&t.name)) {
            return Some(ObjectRef::Table(t));
        }
        if let Some(v) = self.views.iter().find(|v| pred(&v.name)) {
            return Some(ObjectRef::View(v));
        }
        if let Some(f) = self.funcs.iter().find(|f| pred(&f.name)) {
            return Some(ObjectRef::Func(f));
        }
        if let Some(p) = self.procs.iter().find(|p| pred(&p.name)) {
            return Some(ObjectRef::Proc(p));
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ObjectRef<'a> {
    Table(&'a Table),
    View(&'a View),
    Func(&'a Func),
    Proc(&'a Proc),
}

// src/diff/change.rs

//! The closed sum of structural changes the diff engine produces.

use crate::schema::{Check, Column, ForeignKey, Index, Table};
use bitflags::bitflags;

bitflags! {
    /// Which aspect(s) of a paired object changed. Carried on `ModifyColumn`
    /// and reused (subset) on `ModifyIndex`/`ModifyForeignKey` variants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChangeKind: u32 {
        const ATTR          = 1 << 0;
        const CHARSET       = 1 << 1;
        const COLLATE       = 1 << 2;
        const COMMENT       = 1 << 3;
        const NULL          = 1 << 4;
        const TYPE          = 1 << 5;
        const DEFAULT       = 1 << 6;
        const GENERATED     = 1 << 7;
        const UNIQUE        = 1 << 8;
        const PARTS         = 1 << 9;
        const COLUMN        = 1 << 10;
        const REF_COLUMN    = 1 << 11;
        const REF_TABLE     = 1 << 12;
        const UPDATE_ACTION = 1 << 13;
        const DELETE_ACTION = 1 << 14;
    }
}

/// One structural change between a `from` and `to` schema model.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    AddSchema { name: String },
    DropSchema { name: String },
    ModifySchema { name: String, changes: Vec<Change> },

    AddTable { table: Table },
    DropTable { table: Table },
    ModifyTable { name: String, changes: Vec<Change> },
    RenameTable { from: String, to: String },

    AddColumn { column: Column },
    DropColumn { column: Column },
    ModifyColumn { from: Column, to: Column, kind: ChangeKind },
    RenameColumn { from: String, to: String },

    AddIndex { index: Index },
    DropIndex { index: Index },
    ModifyIndex { from: Index, to: Index, kind: ChangeKind },
    RenameIndex { from: String, to: String },

    AddPrimaryKey { index: Index },
    DropPrimaryKey { index: Index },
    ModifyPrimaryKey { from: Index, to: Index, kind: ChangeKind },

    AddForeignKey { fk: ForeignKey },
    DropForeignKey { fk: ForeignKey },
    ModifyForeignKey { from: ForeignKey, to: ForeignKey, kind: ChangeKind },

    AddCheck { check: Check },
    DropCheck { check: Check },
    ModifyCheck { from: Check, to: Check },

    AddAttr { table: String, key: String },
    DropAttr { table: String, key: String },
    ModifyAttr { table: String, key: String },
}

impl Change {
    /// The table this change is scoped to, if it is table-level (used by
    /// the planner's dependency graph).
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Change::AddTable { table } | Change::DropTable { table } => Some(&table.name),
            Change::ModifyTable { name, .. } => Some(name),
            Change::RenameTable { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Whether this change, standing alone, can be undone with a reverse
    /// statement. The planner uses a sturdier rule (missing column
    /// metadata on drops makes the *plan* irreversible) but the change
    /// itself has an opinion too: anything without enough information to
    /// reconstruct a reverse is never reversible regardless of dialect.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Change::AddAttr { .. } | Change::DropAttr { .. } | Change::ModifyAttr { .. })
    }
}

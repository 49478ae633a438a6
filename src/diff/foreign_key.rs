// src/diff/foreign_key.rs

use super::change::ChangeKind;
use crate::schema::ForeignKey;

/// Compares column list (ordered), ref table name, ref column list
/// (ordered), and actions. `""` and `NO ACTION` are the same value at the
/// model level already (see `ReferenceOption::from_str`), so no special
/// casing is needed here.
pub fn diff_foreign_key(from: &ForeignKey, to: &ForeignKey) -> ChangeKind {
    let mut kind = ChangeKind::empty();

    if from.columns != to.columns {
        kind |= ChangeKind::COLUMN;
    }
    if from.ref_table != to.ref_table {
        kind |= ChangeKind::REF_TABLE;
    }
    if from.ref_columns != to.ref_columns {
        kind |= ChangeKind::REF_COLUMN;
    }
    if from.on_update != to.on_update {
        kind |= ChangeKind::UPDATE_ACTION;
    }
    if from.on_delete != to.on_delete {
        kind |= ChangeKind::DELETE_ACTION;
    }
    kind
}

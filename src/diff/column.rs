// src/diff/column.rs

use super::change::{Change, ChangeKind};
use super::{DiffError, DiffResult};
use crate::schema::{Column, ColumnDefault};

/// Optional callback for asking a live database whether two raw expressions
/// are equivalent (`SELECT <from> = <to>`). When absent, the diff falls
/// back to lexical/structural comparison, per §4.D.
pub trait DefaultEquivalence {
    fn exprs_equal(&self, from: &str, to: &str) -> bool;
}

pub fn diff_column(
    from: &Column,
    to: &Column,
    probe: Option<&dyn DefaultEquivalence>,
) -> DiffResult<Option<Change>> {
    let mut kind = ChangeKind::empty();

    if from.nullable != to.nullable {
        kind |= ChangeKind::NULL;
    }
    if type_changed(from, to) {
        kind |= ChangeKind::TYPE;
    }
    if default_changed(from.default.as_ref(), to.default.as_ref(), probe) {
        kind |= ChangeKind::DEFAULT;
    }
    if generated_changed(from, to)? {
        kind |= ChangeKind::GENERATED;
    }
    if identity_changed(from, to) {
        kind |= ChangeKind::ATTR;
    }
    if from.attrs.comment() != to.attrs.comment() {
        kind |= ChangeKind::COMMENT;
    }
    if from.attrs.charset() != to.attrs.charset() {
        kind |= ChangeKind::CHARSET;
    }
    if from.attrs.collation() != to.attrs.collation() {
        kind |= ChangeKind::COLLATE;
    }

    if kind.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Change::ModifyColumn {
            from: from.clone(),
            to: to.clone(),
            kind,
        }))
    }
}

/// Structural equality on the erased type first; for named types (enum,
/// domain, dialect-unsupported) falls through to comparing the
/// qualifier-normalized name; otherwise compares the dialect's canonical
/// textual format.
fn type_changed(from: &Column, to: &Column) -> bool {
    if from.ty.structurally_eq(&to.ty) {
        return false;
    }
    match (from.ty.named(), to.ty.named()) {
        (Some(a), Some(b)) => normalize_qualifier(a) != normalize_qualifier(b),
        _ => from.raw_type != to.raw_type,
    }
}

fn normalize_qualifier(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Trims SQL casts and strips matching quotes before comparing; if either
/// side is a raw expression and a probe is available, defers to the
/// database's own notion of equivalence.
fn default_changed(
    from: Option<&ColumnDefault>,
    to: Option<&ColumnDefault>,
    probe: Option<&dyn DefaultEquivalence>,
) -> bool {
    match (from, to) {
        (None, None) => false,
        (Some(a), Some(b)) => !defaults_equal(a, b, probe),
        _ => true,
    }
}

fn defaults_equal(a: &ColumnDefault, b: &ColumnDefault, probe: Option<&dyn DefaultEquivalence>) -> bool {
    let (a_text, a_raw) = unwrap_default(a);
    let (b_text, b_raw) = unwrap_default(b);

    if normalize_literal(&a_text) == normalize_literal(&b_text) {
        return true;
    }
    if a_raw || b_raw {
        if let Some(probe) = probe {
            return probe.exprs_equal(&a_text, &b_text);
        }
    }
    false
}

fn unwrap_default(d: &ColumnDefault) -> (String, bool) {
    match d {
        ColumnDefault::Literal(s) => (s.clone(), false),
        ColumnDefault::RawExpr(s) => (s.clone(), true),
        ColumnDefault::Named { inner, .. } => unwrap_default(inner),
    }
}

fn normalize_literal(s: &str) -> String {
    let trimmed = strip_cast(s.trim());
    strip_matching_quotes(trimmed).to_string()
}

/// Strips a trailing `::type` Postgres-style cast, leaving the rest intact.
fn strip_cast(s: &str) -> &str {
    match s.find("::") {
        Some(idx) => &s[..idx],
        None => s,
    }
}

fn strip_matching_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Only dropping a generated expression (`Some -> None`) is a supported
/// change. Adding one or altering its text is rejected outright rather than
/// planned as a silent `ChangeKind::GENERATED`.
fn generated_changed(from: &Column, to: &Column) -> DiffResult<bool> {
    match (&from.generated_expr, &to.generated_expr) {
        (a, b) if a == b => Ok(false),
        (Some(_), None) => Ok(true),
        _ => Err(DiffError::GeneratedExpressionNotSupported { column: to.name.clone() }),
    }
}

fn identity_changed(from: &Column, to: &Column) -> bool {
    from.identity != to.identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Identity, IdentityGeneration, Type};

    fn int_column(name: &str) -> Column {
        Column::new(name, Type::Integer { bits: 64, unsigned: false })
    }

    #[test]
    fn null_flip_is_detected() {
        let from = int_column("age");
        let to = int_column("age").not_null();
        let change = diff_column(&from, &to, None).unwrap().unwrap();
        match change {
            Change::ModifyColumn { kind, .. } => assert!(kind.contains(ChangeKind::NULL)),
            _ => panic!("expected ModifyColumn"),
        }
    }

    #[test]
    fn identical_columns_produce_no_change() {
        let from = int_column("age");
        let to = int_column("age");
        assert!(diff_column(&from, &to, None).unwrap().is_none());
    }

    #[test]
    fn default_cast_and_quote_noise_is_ignored() {
        let from = int_column("status").with_default(ColumnDefault::RawExpr("'active'::text".into()));
        let to = int_column("status").with_default(ColumnDefault::Literal("active".into()));
        assert!(diff_column(&from, &to, None).unwrap().is_none());
    }

    #[test]
    fn raw_expr_default_falls_back_to_probe() {
        struct AlwaysEqual;
        impl DefaultEquivalence for AlwaysEqual {
            fn exprs_equal(&self, _from: &str, _to: &str) -> bool {
                true
            }
        }
        let from = int_column("created_at").with_default(ColumnDefault::RawExpr("now()".into()));
        let to = int_column("created_at").with_default(ColumnDefault::RawExpr("current_timestamp".into()));
        assert!(diff_column(&from, &to, Some(&AlwaysEqual)).unwrap().is_none());
        assert!(diff_column(&from, &to, None).unwrap().is_some());
    }

    #[test]
    fn identity_deviation_reports_attr_change() {
        let from = int_column("id").with_identity(Identity::default());
        let to = int_column("id").with_identity(Identity {
            generation: IdentityGeneration::ByDefault,
            start: 100,
            increment: 1,
        });
        let change = diff_column(&from, &to, None).unwrap().unwrap();
        match change {
            Change::ModifyColumn { kind, .. } => assert!(kind.contains(ChangeKind::ATTR)),
            _ => panic!("expected ModifyColumn"),
        }
    }

    #[test]
    fn dropping_a_generated_expression_is_allowed() {
        let mut from = int_column("full_name");
        from.generated_expr = Some("first || ' ' || last".into());
        let to = int_column("full_name");
        let change = diff_column(&from, &to, None).unwrap().unwrap();
        match change {
            Change::ModifyColumn { kind, .. } => assert!(kind.contains(ChangeKind::GENERATED)),
            _ => panic!("expected ModifyColumn"),
        }
    }

    #[test]
    fn adding_a_generated_expression_is_rejected() {
        let from = int_column("full_name");
        let mut to = int_column("full_name");
        to.generated_expr = Some("first || ' ' || last".into());
        assert!(matches!(
            diff_column(&from, &to, None),
            Err(DiffError::GeneratedExpressionNotSupported { .. })
        ));
    }

    #[test]
    fn changing_a_generated_expression_is_rejected() {
        let mut from = int_column("full_name");
        from.generated_expr = Some("first || ' ' || last".into());
        let mut to = int_column("full_name");
        to.generated_expr = Some("last || ', ' || first".into());
        assert!(matches!(
            diff_column(&from, &to, None),
            Err(DiffError::GeneratedExpressionNotSupported { .. })
        ));
    }
}

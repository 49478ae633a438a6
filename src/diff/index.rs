// src/diff/index.rs

use super::change::ChangeKind;
use crate::schema::Index;

/// Pairs from/to indexes within a table. Indexes with an explicit (matching)
/// name pair directly; a name considered "auto-generated" by `is_auto_name`
/// is treated as absent and paired by structural equivalence instead, per
/// the auto-generated-name rule in §4.D step 7.
pub fn pair_indexes<'a>(
    from: &'a [Index],
    to: &'a [Index],
    is_auto_name: impl Fn(&str) -> bool,
) -> Vec<(Option<&'a Index>, Option<&'a Index>)> {
    let mut to_remaining: Vec<&Index> = to.iter().collect();
    let mut pairs = Vec::new();

    for f in from {
        let named_match = if !is_auto_name(&f.name) {
            to_remaining.iter().position(|t| t.name == f.name && !is_auto_name(&t.name))
        } else {
            None
        };

        let matched_idx = named_match.or_else(|| {
            to_remaining
                .iter()
                .position(|t| structurally_equivalent(f, t))
        });

        match matched_idx {
            Some(i) => pairs.push((Some(f), Some(to_remaining.remove(i)))),
            None => pairs.push((Some(f), None)),
        }
    }
    for t in to_remaining {
        pairs.push((None, Some(t)));
    }
    pairs
}

fn structurally_equivalent(a: &Index, b: &Index) -> bool {
    a.unique == b.unique
        && a.parts.len() == b.parts.len()
        && a.parts.iter().zip(b.parts.iter()).all(|(pa, pb)| pa.target == pb.target && pa.desc == pb.desc)
}

pub fn diff_index(from: &Index, to: &Index) -> ChangeKind {
    let mut kind = ChangeKind::empty();

    if from.effective_type() != to.effective_type() {
        kind |= ChangeKind::ATTR;
    }
    if from.nulls_distinct != to.nulls_distinct {
        kind |= ChangeKind::ATTR;
    }
    if from.include != to.include {
        kind |= ChangeKind::ATTR;
    }
    if normalize_predicate(from.predicate.as_deref()) != normalize_predicate(to.predicate.as_deref()) {
        kind |= ChangeKind::ATTR;
    }
    if from.unique != to.unique {
        kind |= ChangeKind::UNIQUE;
    }
    if parts_changed(from, to) {
        kind |= ChangeKind::PARTS;
    }
    kind
}

/// Either side may be wrapped in a single layer of parens; that's
/// considered equivalent.
fn normalize_predicate(p: Option<&str>) -> Option<String> {
    p.map(|s| {
        let s = s.trim();
        if s.starts_with('(') && s.ends_with(')') {
            s[1..s.len() - 1].trim().to_string()
        } else {
            s.to_string()
        }
    })
}

fn parts_changed(from: &Index, to: &Index) -> bool {
    if from.parts.len() != to.parts.len() {
        return true;
    }
    from.parts.iter().zip(to.parts.iter()).any(|(a, b)| {
        a.target != b.target
            || a.desc != b.desc
            || a.effective_nulls_first() != b.effective_nulls_first()
            || !operator_class_eq(a.operator_class.as_deref(), b.operator_class.as_deref())
    })
}

/// A non-default operator class equal to "default, no params" is treated
/// as default.
fn operator_class_eq(a: Option<&str>, b: Option<&str>) -> bool {
    let norm = |o: Option<&str>| o.filter(|s| !s.is_empty()).map(str::to_string);
    norm(a) == norm(b)
}

// src/diff/check.rs

use crate::schema::Check;

/// Pairs by name when both are named; unnamed checks pair by
/// expression + attribute equivalence. `NO INHERIT` participates in
/// identity, so two checks differing only in that flag are not equal.
pub fn checks_equal(a: &Check, b: &Check) -> bool {
    a.no_inherit == b.no_inherit && normalize_expr(&a.expr) == normalize_expr(&b.expr)
}

fn normalize_expr(expr: &str) -> String {
    expr.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn pair_checks<'a>(from: &'a [Check], to: &'a [Check]) -> Vec<(Option<&'a Check>, Option<&'a Check>)> {
    let mut to_remaining: Vec<&Check> = to.iter().collect();
    let mut pairs = Vec::new();

    for f in from {
        let idx = if let Some(name) = &f.name {
            to_remaining.iter().position(|t| t.name.as_deref() == Some(name.as_str()))
        } else {
            to_remaining.iter().position(|t| t.name.is_none() && checks_equal(f, t))
        };
        match idx {
            Some(i) => pairs.push((Some(f), Some(to_remaining.remove(i)))),
            None => pairs.push((Some(f), None)),
        }
    }
    for t in to_remaining {
        pairs.push((None, Some(t)));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttrList;

    fn check(name: Option<&str>, expr: &str) -> Check {
        Check {
            name: name.map(String::from),
            expr: expr.to_string(),
            no_inherit: false,
            attrs: AttrList::new(),
        }
    }

    #[test]
    fn unnamed_checks_pair_by_expression() {
        let from = vec![check(None, "age > 0")];
        let to = vec![check(None, "age   >   0")];
        let pairs = pair_checks(&from, &to);
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].0.is_some() && pairs[0].1.is_some());
    }

    #[test]
    fn no_inherit_flag_breaks_equivalence() {
        let mut a = check(Some("chk_age"), "age > 0");
        let mut b = check(Some("chk_age"), "age > 0");
        b.no_inherit = true;
        assert!(!checks_equal(&a, &b));
        a.no_inherit = true;
        assert!(checks_equal(&a, &b));
    }
}

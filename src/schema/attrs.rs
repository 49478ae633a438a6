// src/schema/attrs.rs

//! Heterogeneous attribute storage.
//!
//! The core recognizes a closed set of structural attributes (comment,
//! charset, collation) that are naturally singletons -- at most one
//! instance per type lives on any given attribute list -- plus one open
//! `Extra` slot for dialect-specific attributes the core has no first-class
//! representation for.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collation(pub String);

/// One opaque attribute. Dialect plug-ins that need a shape not covered by
/// the closed variants stash their data in `Extra` keyed by a name they
/// control.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Comment(Comment),
    Charset(Charset),
    Collation(Collation),
    Extra { key: String, value: Value },
}

/// An ordered bag of [`Attr`] values with singleton-replace semantics for
/// the closed variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrList(pub Vec<Attr>);

impl AttrList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comment(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Attr::Comment(Comment(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn charset(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Attr::Charset(Charset(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn collation(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Attr::Collation(Collation(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.0.iter().find_map(|a| match a {
            Attr::Extra { key: k, value } if k == key => Some(value),
            _ => None,
        })
    }

    /// Replace an existing attribute of the same kind, or append if none
    /// exists yet. Singleton semantics for `Comment`/`Charset`/`Collation`;
    /// `Extra` is keyed by its string key.
    pub fn replace_or_append(&mut self, attr: Attr) {
        let slot = self.0.iter_mut().find(|existing| same_kind(existing, &attr));
        match slot {
            Some(slot) => *slot = attr,
            None => self.0.push(attr),
        }
    }

    pub fn remove_comment(&mut self) {
        self.0.retain(|a| !matches!(a, Attr::Comment(_)));
    }

    pub fn remove_charset(&mut self) {
        self.0.retain(|a| !matches!(a, Attr::Charset(_)));
    }

    pub fn remove_collation(&mut self) {
        self.0.retain(|a| !matches!(a, Attr::Collation(_)));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn same_kind(a: &Attr, b: &Attr) -> bool {
    match (a, b) {
        (Attr::Comment(_), Attr::Comment(_)) => true,
        (Attr::Charset(_), Attr::Charset(_)) => true,
        (Attr::Collation(_), Attr::Collation(_)) => true,
        (Attr::Extra { key: k1, .. }, Attr::Extra { key: k2, .. }) => k1 == k2,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_or_append_keeps_one_comment() {
        let mut attrs = AttrList::new();
        attrs.replace_or_append(Attr::Comment(Comment("first".into())));
        attrs.replace_or_append(Attr::Comment(Comment("second".into())));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.comment(), Some("second"));
    }

    #[test]
    fn extra_attrs_are_keyed_independently() {
        let mut attrs = AttrList::new();
        attrs.replace_or_append(Attr::Extra {
            key: "pg.storage_params".into(),
            value: Value::String("fillfactor=90".into()),
        });
        attrs.replace_or_append(Attr::Extra {
            key: "pg.access_method".into(),
            value: Value::String("heap".into()),
        });
        assert_eq!(attrs.len(), 2);
        assert!(attrs.extra("pg.storage_params").is_some());
        assert!(attrs.extra("pg.access_method").is_some());
    }

    #[test]
    fn remove_comment_clears_only_comments() {
        let mut attrs = AttrList::new();
        attrs.replace_or_append(Attr::Comment(Comment("x".into())));
        attrs.replace_or_append(Attr::Charset(Charset("utf8".into())));
        attrs.remove_comment();
        assert!(attrs.comment().is_none());
        assert!(attrs.charset().is_some());
    }
}

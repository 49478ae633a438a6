// src/schema/index.rs

use super::attrs::AttrList;

/// What one index part sorts on: a named column, or an expression (e.g. a
/// functional index part like `lower(email)`).
#[derive(Debug, Clone, PartialEq)]
pub enum IndexPartTarget {
    Column(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexPart {
    pub seq_no: u32,
    pub desc: bool,
    pub target: IndexPartTarget,
    /// `NULLS FIRST`/`NULLS LAST`; `None` means "dialect default", which the
    /// diff engine resolves against `desc` (DESC defaults first, ASC
    /// defaults last) before comparing.
    pub nulls_first: Option<bool>,
    pub operator_class: Option<String>,
    pub attrs: AttrList,
}

impl IndexPart {
    pub fn column(seq_no: u32, name: impl Into<String>) -> Self {
        Self {
            seq_no,
            desc: false,
            target: IndexPartTarget::Column(name.into()),
            nulls_first: None,
            operator_class: None,
            attrs: AttrList::new(),
        }
    }

    /// Resolves the effective `NULLS FIRST`/`LAST` placement, applying the
    /// dialect default (DESC -> nulls first, ASC -> nulls last) when the
    /// part doesn't specify one explicitly.
    pub fn effective_nulls_first(&self) -> bool {
        self.nulls_first.unwrap_or(self.desc)
    }
}

/// Belongs to exactly one table or view, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    pub parts: Vec<IndexPart>,
    /// btree/hash/gin/... ; `None` means dialect default (btree).
    pub index_type: Option<String>,
    pub nulls_distinct: bool,
    pub include: Vec<String>,
    pub predicate: Option<String>,
    pub attrs: AttrList,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: false,
            parts: Vec::new(),
            index_type: None,
            nulls_distinct: true,
            include: Vec::new(),
            predicate: None,
            attrs: AttrList::new(),
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn add_part(mut self, part: IndexPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn effective_type(&self) -> &str {
        self.index_type.as_deref().unwrap_or("btree")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_type_defaults_to_btree() {
        let idx = Index::new("idx_users_email");
        assert_eq!(idx.effective_type(), "btree");
    }

    #[test]
    fn nulls_placement_defaults_follow_sort_direction() {
        let mut asc = IndexPart::column(0, "name");
        let mut desc = IndexPart::column(1, "name");
        desc.desc = true;
        assert!(!asc.effective_nulls_first());
        assert!(desc.effective_nulls_first());

        asc.nulls_first = Some(true);
        assert!(asc.effective_nulls_first());
    }
}

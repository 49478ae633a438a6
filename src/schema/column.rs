// src/schema/column.rs

use super::attrs::AttrList;
use super::types::Type;

/// `GENERATED { ALWAYS | BY DEFAULT } AS IDENTITY` configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityGeneration {
    #[default]
    ByDefault,
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub generation: IdentityGeneration,
    pub start: i64,
    pub increment: i64,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            generation: IdentityGeneration::ByDefault,
            start: 1,
            increment: 1,
        }
    }
}

/// A column default expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// A raw literal token, e.g. `0`, `'active'`.
    Literal(String),
    /// An expression inlined verbatim, e.g. `now()`.
    RawExpr(String),
    /// A named wrapper over either of the above (constraint name in
    /// dialects that name defaults, e.g. SQL Server).
    Named { name: String, inner: Box<ColumnDefault> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: Type,
    /// The raw type string as written/reported by the dialect, used for
    /// textual-format comparison when the erased `Type` doesn't capture
    /// enough detail to decide equivalence on its own.
    pub raw_type: String,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub generated_expr: Option<String>,
    pub identity: Option<Identity>,
    pub attrs: AttrList,
    /// Names of indexes this column participates in (back-reference).
    pub index_refs: Vec<String>,
    /// Symbols of foreign keys whose child columns include this column.
    pub fk_refs: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        let raw_type = format!("{ty:?}");
        Self {
            name: name.into(),
            ty,
            raw_type,
            nullable: true,
            default: None,
            generated_expr: None,
            identity: None,
            attrs: AttrList::new(),
            index_refs: Vec::new(),
            fk_refs: Vec::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn set_not_null(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_nullability_and_default() {
        let col = Column::new("id", Type::Integer { bits: 64, unsigned: false })
            .not_null()
            .with_default(ColumnDefault::Literal("0".into()));
        assert!(!col.nullable);
        assert_eq!(col.default, Some(ColumnDefault::Literal("0".into())));
    }

    #[test]
    fn identity_defaults_match_standard_sql() {
        let identity = Identity::default();
        assert_eq!(identity.generation, IdentityGeneration::ByDefault);
        assert_eq!(identity.start, 1);
        assert_eq!(identity.increment, 1);
    }
}

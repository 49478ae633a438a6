// src/schema/types.rs

//! Erased column types.
//!
//! Dialects that need a richer type (arrays, ranges, domains, network
//! addresses...) that has no first-class variant here fall back to
//! `Type::Unsupported` carrying the raw type string, and attach any
//! structured detail as a schema attribute instead.

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Bool,
    Integer { bits: u16, unsigned: bool },
    Decimal { precision: u8, scale: u8 },
    Float { bits: u16 },
    String { size: Option<u32> },
    Binary { size: Option<u32> },
    Time { precision: u8 },
    Json,
    Spatial,
    Uuid,
    Enum { name: Option<String>, values: Vec<String> },
    Unsupported { raw: String },
}

impl Type {
    /// Structural equality ignoring any named-type qualifiers; named types
    /// (enum, unsupported) are compared by name separately in the diff
    /// engine since schema-qualified names need normalization first.
    pub fn structurally_eq(&self, other: &Type) -> bool {
        use Type::*;
        match (self, other) {
            (Bool, Bool) => true,
            (Integer { bits: b1, unsigned: u1 }, Integer { bits: b2, unsigned: u2 }) => {
                b1 == b2 && u1 == u2
            }
            (Decimal { precision: p1, scale: s1 }, Decimal { precision: p2, scale: s2 }) => {
                p1 == p2 && s1 == s2
            }
            (Float { bits: b1 }, Float { bits: b2 }) => b1 == b2,
            (String { size: s1 }, String { size: s2 }) => s1 == s2,
            (Binary { size: s1 }, Binary { size: s2 }) => s1 == s2,
            (Time { precision: p1 }, Time { precision: p2 }) => p1 == p2,
            (Json, Json) => true,
            (Spatial, Spatial) => true,
            (Uuid, Uuid) => true,
            (Enum { values: v1, .. }, Enum { values: v2, .. }) => v1 == v2,
            (Unsupported { raw: r1 }, Unsupported { raw: r2 }) => r1 == r2,
            _ => false,
        }
    }

    /// Named types (enum with an owning schema, or any dialect-unsupported
    /// type threaded through as a raw name) compare by qualifier-normalized
    /// name rather than structure.
    pub fn named(&self) -> Option<&str> {
        match self {
            Type::Enum { name: Some(n), .. } => Some(n.as_str()),
            Type::Unsupported { raw } => Some(raw.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_types_compare_by_width_and_sign() {
        let a = Type::Integer { bits: 32, unsigned: false };
        let b = Type::Integer { bits: 32, unsigned: false };
        let c = Type::Integer { bits: 64, unsigned: false };
        assert!(a.structurally_eq(&b));
        assert!(!a.structurally_eq(&c));
    }

    #[test]
    fn enum_values_determine_structural_equality() {
        let a = Type::Enum { name: Some("mood".into()), values: vec!["sad".into(), "ok".into()] };
        let b = Type::Enum { name: Some("mood".into()), values: vec!["sad".into(), "ok".into()] };
        let c = Type::Enum { name: Some("mood".into()), values: vec!["sad".into()] };
        assert!(a.structurally_eq(&b));
        assert!(!a.structurally_eq(&c));
        assert_eq!(a.named(), Some("mood"));
    }
}

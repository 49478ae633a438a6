// src/schema/foreign_key.rs

use std::str::FromStr;

/// `ON UPDATE`/`ON DELETE` action. The empty string is treated as `NoAction`
/// throughout the diff engine -- the two are never distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceOption {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferenceOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl FromStr for ReferenceOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "NO ACTION" => Ok(Self::NoAction),
            "RESTRICT" => Ok(Self::Restrict),
            "CASCADE" => Ok(Self::Cascade),
            "SET NULL" => Ok(Self::SetNull),
            "SET DEFAULT" => Ok(Self::SetDefault),
            other => Err(format!("unrecognized reference option: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub symbol: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_update: ReferenceOption,
    pub on_delete: ReferenceOption,
}

impl ForeignKey {
    pub fn new(symbol: impl Into<String>, ref_table: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            columns: Vec::new(),
            ref_table: ref_table.into(),
            ref_columns: Vec::new(),
            on_update: ReferenceOption::NoAction,
            on_delete: ReferenceOption::NoAction,
        }
    }
}

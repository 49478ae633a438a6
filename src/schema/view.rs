// src/schema/view.rs

use super::attrs::AttrList;
use super::column::Column;
use super::table::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckOption {
    #[default]
    None,
    Local,
    Cascaded,
}

#[derive(Debug, Clone, Default)]
pub struct View {
    pub name: String,
    pub definition: String,
    pub columns: Vec<Column>,
    pub materialized: bool,
    pub check_option: CheckOption,
    pub triggers: Vec<Trigger>,
    pub attrs: AttrList,
    pub deps: Vec<String>,
    pub refs: Vec<String>,
}

impl View {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            ..Default::default()
        }
    }

    pub fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialized_marker_defaults_to_false() {
        let view = View::new("v", "SELECT 1");
        assert!(!view.materialized);
        assert_eq!(view.check_option, CheckOption::None);
    }
}

use serde::{Deserialize, Serialize};
use crate::ty::{ScalarKind, DEFAULT_MAX_DEPTH};

/// Engine policy. Every field has a default so partial documents decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recursion budget for every recursive type or entity resolution.
    pub max_depth: usize,
    /// Abort builder resolution when a step exists on neither builder contract.
    pub verify_builder_methods: bool,
    /// Turn unresolvable chains and catalog failures into errors.
    pub strict: bool,
    /// Base type of a validation leaf with no type-determining rule.
    pub default_rule_type: ScalarKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            verify_builder_methods: false,
            strict: false,
            default_rule_type: ScalarKind::String,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "strict": true }"#).unwrap();
        assert!(cfg.strict);
        assert_eq!(cfg.max_depth, 20);
        assert_eq!(cfg.default_rule_type, ScalarKind::String);
    }
}

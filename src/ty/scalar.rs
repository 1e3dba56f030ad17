use std::collections::BTreeSet;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Bool,
    Null,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Null => "null",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Integer | ScalarKind::Float)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(ScalarKind::String),
            "int" | "integer" => Some(ScalarKind::Integer),
            "float" | "double" | "number" => Some(ScalarKind::Float),
            "bool" | "boolean" => Some(ScalarKind::Bool),
            "null" => Some(ScalarKind::Null),
            _ => None,
        }
    }
}

/// A single literal value a scalar may be narrowed to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Literal {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Literal::Bool(_) => ScalarKind::Bool,
            Literal::Int(_) => ScalarKind::Integer,
            Literal::Float(_) => ScalarKind::Float,
            Literal::Str(_) => ScalarKind::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Bool(b) => serde_json::Value::from(*b),
            Literal::Int(i) => serde_json::Value::from(*i),
            Literal::Float(f) => serde_json::Value::from(f.0),
            Literal::Str(s) => serde_json::Value::from(s.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarTy {
    #[serde(rename = "scalar")]
    pub kind: ScalarKind,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub literals: BTreeSet<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ScalarTy {
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            literals: BTreeSet::new(),
            format: None,
            minimum: None,
            maximum: None,
            pattern: None,
        }
    }

    /// Same-kind join. An empty literal set means "any value of the kind", so
    /// it absorbs the other side's literals.
    pub(super) fn merge(a: &Self, b: &Self) -> Self {
        debug_assert_eq!(a.kind, b.kind);
        let mut out = Self::new(a.kind);
        if !a.literals.is_empty() && !b.literals.is_empty() {
            out.literals = &a.literals | &b.literals;
        }
        out.format = if a.format == b.format { a.format.clone() } else { None };
        out.pattern = if a.pattern == b.pattern { a.pattern.clone() } else { None };
        out.minimum = match (a.minimum, b.minimum) {
            (Some(x), Some(y)) => Some(x.min(y)),
            _ => None,
        };
        out.maximum = match (a.maximum, b.maximum) {
            (Some(x), Some(y)) => Some(x.max(y)),
            _ => None,
        };
        out
    }
}

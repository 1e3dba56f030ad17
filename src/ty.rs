//! Type algebra shared by every resolver.
//!
//! A `Type` is a tagged node (`Kind`) plus per-slot metadata (`required`,
//! `description`, `examples`). Operations are pure and depth-bounded:
//! - `merge` joins two types for the same slot without losing information.
//! - `unwrap` turns a shaped array into a homogeneous keyed map.
//! - `Type::union` builds flattened, de-duplicated unions.
//!
//! Every recursive operation takes a `max_depth` budget and answers `Unknown`
//! once it runs out, so cyclic entity graphs cannot recurse forever.
pub mod scalar;
pub mod arr;
pub mod obj;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use scalar::{Literal, ScalarKind, ScalarTy};
pub use arr::ArrTy;
pub use obj::ObjTy;

// ------------------------------- Policy ---------------------------------- //

pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Origin tag stamped on arrays that model a fetched collection.
pub const COLLECTION_ORIGIN: &str = "collection";

// -------------------------------- Model ---------------------------------- //

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Kind {
    #[default]
    Unknown,
    Scalar(ScalarTy),
    Array(ArrTy),
    Object(ObjTy),
    Union { members: Vec<Type> },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Type {
    #[serde(flatten)]
    pub kind: Kind,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

fn is_false(b: &bool) -> bool { !*b }

impl From<Kind> for Type {
    fn from(kind: Kind) -> Self { Self { kind, ..Self::default() } }
}

impl Type {
    pub fn unknown() -> Self { Self::default() }
    pub fn scalar(kind: ScalarKind) -> Self { Kind::Scalar(ScalarTy::new(kind)).into() }
    pub fn string() -> Self { Self::scalar(ScalarKind::String) }
    pub fn integer() -> Self { Self::scalar(ScalarKind::Integer) }
    pub fn float() -> Self { Self::scalar(ScalarKind::Float) }
    pub fn boolean() -> Self { Self::scalar(ScalarKind::Bool) }
    pub fn null() -> Self { Self::scalar(ScalarKind::Null) }

    pub fn formatted(kind: ScalarKind, format: &str) -> Self {
        let mut s = ScalarTy::new(kind);
        s.format = Some(format.to_string());
        Kind::Scalar(s).into()
    }

    /// Scalar narrowed to a finite literal set.
    pub fn literal_set(kind: ScalarKind, literals: impl IntoIterator<Item = Literal>) -> Self {
        let mut s = ScalarTy::new(kind);
        s.literals = literals.into_iter().collect();
        Kind::Scalar(s).into()
    }

    pub fn list(item: Type) -> Self { Kind::Array(ArrTy::list(item)).into() }

    pub fn keyed(key: Option<Type>, item: Type) -> Self { Kind::Array(ArrTy::keyed(key, item)).into() }

    pub fn shape(shape: IndexMap<String, Type>) -> Self { Kind::Array(ArrTy::shaped(shape)).into() }

    pub fn object(properties: IndexMap<String, Type>, origin: Option<String>) -> Self {
        Kind::Object(ObjTy { properties, origin }).into()
    }

    /// Flattened, de-duplicated union. A single member collapses to itself;
    /// no members collapse to `Unknown`.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        for m in members {
            match m.kind {
                Kind::Union { members: inner } => {
                    for x in inner {
                        if !flat.contains(&x) { flat.push(x); }
                    }
                }
                _ => {
                    if !flat.contains(&m) { flat.push(m); }
                }
            }
        }
        match flat.len() {
            0 => Type::unknown(),
            1 => flat.remove(0),
            _ => Kind::Union { members: flat }.into(),
        }
    }

    /// `T | null`, keeping the slot's `required` flag on the outer node.
    pub fn nullable(self) -> Self {
        if self.is_null() { return self; }
        let required = self.required;
        let mut out = Type::union([self.with_required(false), Type::null()]);
        out.required = required;
        out
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        match &mut self.kind {
            Kind::Array(arr) => arr.origin = origin,
            Kind::Object(obj) => obj.origin = origin,
            _ => {}
        }
        self
    }

    pub fn is_unknown(&self) -> bool { matches!(self.kind, Kind::Unknown) }

    pub fn is_null(&self) -> bool { self.scalar_kind() == Some(ScalarKind::Null) }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match &self.kind {
            Kind::Scalar(s) => Some(s.kind),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrTy> {
        match &self.kind {
            Kind::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjTy> {
        match &self.kind {
            Kind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn members(&self) -> &[Type] {
        match &self.kind {
            Kind::Union { members } => members,
            _ => std::slice::from_ref(self),
        }
    }

    /// Type of field `name`: an object property, a shape entry, or the item of
    /// a keyed map. Unions look into each non-null member.
    pub fn field(&self, name: &str) -> Type {
        match &self.kind {
            Kind::Object(obj) => obj.get(name).cloned().unwrap_or_default(),
            Kind::Array(ArrTy { shape: Some(shape), .. }) => shape.get(name).cloned().unwrap_or_default(),
            Kind::Array(arr) => arr.item_type(),
            Kind::Union { members } => Type::union(
                members.iter().filter(|m| !m.is_null()).map(|m| m.field(name).with_required(false)),
            ),
            _ => Type::unknown(),
        }
    }

    /// Type of a literal value as written in source: arrays become shapes
    /// whose keys are always present.
    pub fn from_literal(value: &Value) -> Self {
        match value {
            Value::Null => Type::null(),
            Value::Bool(b) => Type::literal_set(ScalarKind::Bool, [Literal::Bool(*b)]),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Type::literal_set(ScalarKind::Integer, [Literal::Int(i)])
                } else {
                    let f = n.as_f64().unwrap_or(f64::NAN);
                    Type::literal_set(ScalarKind::Float, [Literal::Float(OrderedFloat(f))])
                }
            }
            Value::String(s) => Type::literal_set(ScalarKind::String, [Literal::Str(s.clone())]),
            Value::Array(xs) => Type::shape(
                xs.iter().enumerate()
                    .map(|(i, x)| (i.to_string(), Type::from_literal(x).with_required(true)))
                    .collect(),
            ),
            Value::Object(m) => Type::shape(
                m.iter()
                    .map(|(k, x)| (k.clone(), Type::from_literal(x).with_required(true)))
                    .collect(),
            ),
        }
    }

    /// Literal values this type is narrowed to, in declaration order for
    /// shaped arrays. `None` when any part is open.
    pub fn literals(&self) -> Option<Vec<Literal>> {
        match &self.kind {
            Kind::Scalar(s) if !s.literals.is_empty() => Some(s.literals.iter().cloned().collect()),
            Kind::Scalar(s) if s.kind == ScalarKind::Null => Some(Vec::new()),
            Kind::Array(ArrTy { shape: Some(shape), .. }) => {
                let mut out = Vec::new();
                for v in shape.values() { out.extend(v.literals()?); }
                Some(out)
            }
            Kind::Union { members } => {
                let mut out = Vec::new();
                for m in members { out.extend(m.literals()?); }
                Some(out)
            }
            _ => None,
        }
    }

    /// Alternative lists of literal strings this value may hold: `"a"` gives
    /// `[[a]]`, `['a', 'b']` gives `[[a, b]]`, a union of both gives both
    /// alternatives. Empty when any part is not a known string.
    pub fn string_alternatives(&self) -> Vec<Vec<String>> {
        let mut out: Vec<Vec<String>> = match &self.kind {
            Kind::Scalar(s) if s.kind == ScalarKind::String => s.literals.iter()
                .filter_map(Literal::as_str)
                .map(|s| vec![s.to_string()])
                .collect(),
            Kind::Array(ArrTy { shape: Some(shape), .. }) => {
                let mut acc: Vec<Vec<String>> = vec![Vec::new()];
                for v in shape.values() {
                    let alts = v.string_alternatives();
                    if alts.is_empty() { return Vec::new(); }
                    acc = acc.iter()
                        .flat_map(|prefix| alts.iter().map(move |alt| {
                            let mut x = prefix.clone();
                            x.extend(alt.iter().cloned());
                            x
                        }))
                        .collect();
                }
                acc
            }
            Kind::Union { members } => {
                let mut acc = Vec::new();
                for m in members {
                    let alts = m.string_alternatives();
                    if alts.is_empty() { return Vec::new(); }
                    acc.extend(alts);
                }
                acc
            }
            _ => Vec::new(),
        };
        out.dedup();
        out
    }
}

// -------------------------------- Merge ---------------------------------- //

/// Join two types that describe the same slot (e.g. two branches).
pub fn merge(a: &Type, b: &Type, max_depth: usize) -> Type {
    if max_depth == 0 {
        return Type::unknown();
    }
    if a == b {
        return a.clone();
    }
    let required = a.required && b.required;
    let kind = match (&a.kind, &b.kind) {
        (
            Kind::Array(ArrTy { shape: Some(sa), origin: oa, .. }),
            Kind::Array(ArrTy { shape: Some(sb), origin: ob, .. }),
        ) => {
            let mut arr = ArrTy::shaped(ArrTy::merge_shapes(sa, sb, max_depth - 1));
            arr.origin = if oa == ob { oa.clone() } else { None };
            Kind::Array(arr)
        }
        (Kind::Scalar(sa), Kind::Scalar(sb)) if sa.kind == sb.kind => {
            Kind::Scalar(ScalarTy::merge(sa, sb))
        }
        _ => {
            let mut out = Type::union([a.clone(), b.clone()]);
            out.required = required;
            return out;
        }
    };
    Type {
        kind,
        required,
        description: a.description.clone().or_else(|| b.description.clone()),
        examples: if a.examples.is_empty() { b.examples.clone() } else { a.examples.clone() },
    }
}

/// Fold any number of types through `merge`.
pub fn merge_all(types: impl IntoIterator<Item = Type>, max_depth: usize) -> Option<Type> {
    types.into_iter().fold(None, |acc, t| Some(match acc {
        None => t,
        Some(prev) => merge(&prev, &t, max_depth),
    }))
}

/// Convert a shaped array into a keyed map (`{key, item}`), dropping per-key
/// `required` flags which a homogeneous map cannot express. Unions are
/// unwrapped member-wise; other types pass through.
pub fn unwrap(t: &Type, max_depth: usize) -> Type {
    if max_depth == 0 {
        return Type::unknown();
    }
    match &t.kind {
        Kind::Array(ArrTy { shape: Some(shape), origin, .. }) => {
            let values = shape.values().map(|v| v.clone().with_required(false));
            let item = merge_all(values, max_depth - 1).unwrap_or_default();
            let key = arr::key_type_of(shape.keys());
            let mut out = Type::keyed(key, item).with_origin(origin.clone());
            out.required = t.required;
            out.description = t.description.clone();
            out.examples = t.examples.clone();
            out
        }
        Kind::Union { members } => {
            let mut out = Type::union(members.iter().map(|m| unwrap(m, max_depth - 1)));
            out.required = t.required;
            out
        }
        _ => t.clone(),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn has_nested_union(t: &Type) -> bool {
        match &t.kind {
            Kind::Union { members } => members.iter().any(|m| matches!(m.kind, Kind::Union { .. })),
            _ => false,
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let a = Type::from_literal(&json!({"id": 1, "tags": ["x", "y"]}));
        assert_eq!(merge(&a, &a, DEFAULT_MAX_DEPTH), a);
        let u = Type::union([Type::string(), Type::integer()]);
        assert_eq!(merge(&u, &u, DEFAULT_MAX_DEPTH), u);
    }

    #[test]
    fn merge_never_nests_unions() {
        let ab = merge(&Type::string(), &Type::integer(), DEFAULT_MAX_DEPTH);
        let abc = merge(&ab, &Type::boolean(), DEFAULT_MAX_DEPTH);
        assert!(!has_nested_union(&abc));
        assert_eq!(abc.members().len(), 3);
        let again = merge(&abc, &ab, DEFAULT_MAX_DEPTH);
        assert!(!has_nested_union(&again));
        assert_eq!(again.members().len(), 3);
    }

    #[test]
    fn merge_same_kind_unions_literal_sets() {
        let a = Type::from_literal(&json!("draft"));
        let b = Type::from_literal(&json!("published"));
        let out = merge(&a, &b, DEFAULT_MAX_DEPTH);
        assert_eq!(out.literals().unwrap().len(), 2);
        assert_eq!(out.scalar_kind(), Some(ScalarKind::String));
    }

    #[test]
    fn merge_shapes_relaxes_one_sided_keys() {
        let a = Type::from_literal(&json!({"id": 1, "name": "a"}));
        let b = Type::from_literal(&json!({"id": 2}));
        let out = merge(&a, &b, DEFAULT_MAX_DEPTH);
        let shape = out.as_array().unwrap().shape.as_ref().unwrap();
        assert!(shape["id"].required);
        assert!(!shape["name"].required);
        assert_eq!(shape["id"].literals().unwrap().len(), 2);
    }

    #[test]
    fn exhausted_budget_yields_unknown() {
        let a = Type::from_literal(&json!({"a": {"b": 1}}));
        let b = Type::from_literal(&json!({"a": {"b": 2}}));
        assert!(merge(&a, &b, 0).is_unknown());
        let out = merge(&a, &b, 1);
        let shape = out.as_array().unwrap().shape.as_ref().unwrap();
        assert!(shape["a"].is_unknown());
    }

    #[test]
    fn unwrap_homogeneous_shape_to_list() {
        let t = Type::from_literal(&json!(["a", "b"]));
        let out = unwrap(&t, DEFAULT_MAX_DEPTH);
        let arr = out.as_array().unwrap();
        assert!(arr.shape.is_none());
        assert!(arr.key.is_none());
        let item = arr.item_type();
        assert_eq!(item.scalar_kind(), Some(ScalarKind::String));
        assert!(!item.required);
    }

    #[test]
    fn unwrap_record_to_string_keyed_union() {
        let t = Type::from_literal(&json!({"id": 1, "name": "x"}));
        let out = unwrap(&t, DEFAULT_MAX_DEPTH);
        let arr = out.as_array().unwrap();
        assert_eq!(arr.key_type(), Some(Type::string()));
        assert_eq!(arr.item_type().members().len(), 2);
    }

    #[test]
    fn string_alternatives_cover_unions_of_arrays() {
        let t = Type::union([
            Type::from_literal(&json!(["id", "name"])),
            Type::from_literal(&json!(["id"])),
        ]);
        assert_eq!(t.string_alternatives(), vec![
            vec!["id".to_string(), "name".to_string()],
            vec!["id".to_string()],
        ]);
        assert!(Type::string().string_alternatives().is_empty());
    }

    #[test]
    fn nullable_keeps_required_outside() {
        let t = Type::integer().with_required(true).nullable();
        assert!(t.required);
        assert_eq!(t.members(), &[Type::integer(), Type::null()]);
    }
}

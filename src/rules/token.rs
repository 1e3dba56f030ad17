//! Rule tokens: pipe strings, named rules with parameters, rule objects, and
//! the closed catalog of type-determining rule names.
use serde::{Deserialize, Serialize};
use crate::ty::{Kind, Literal, ScalarKind, Type};

/// A rule as written: a string (possibly several joined by `|`) or an object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleToken {
    Str(String),
    Object(RuleObject),
}

impl From<&str> for RuleToken {
    fn from(s: &str) -> Self { RuleToken::Str(s.to_string()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleObject {
    #[serde(flatten)]
    pub class: RuleClass,
    /// Constructor arguments, already typed.
    #[serde(default)]
    pub args: Vec<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleClass {
    /// Inclusion list; the allowed values are the literal arguments.
    In,
    NotIn,
    /// Values of a declared enumeration.
    Enum { name: String },
    Password,
    Email,
    /// Any rule object without type information.
    Other { name: String },
}

/// One string rule: `name[:params]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedRule {
    pub name: String,
    /// Everything after the first `:`, verbatim.
    pub raw: String,
}

impl NamedRule {
    pub fn parse(src: &str) -> Self {
        let (name, raw) = src.split_once(':').unwrap_or((src, ""));
        Self { name: name.trim().to_ascii_lowercase(), raw: raw.to_string() }
    }

    pub fn params(&self) -> Vec<&str> {
        if self.raw.is_empty() { Vec::new() } else { self.raw.split(',').map(str::trim).collect() }
    }

    pub fn number(&self, i: usize) -> Option<f64> {
        self.params().get(i)?.parse().ok()
    }
}

/// Split a pipe string into rules. A `regex:`/`not_regex:` rule takes the
/// rest of the string, pipes included.
pub fn split_pipes(src: &str) -> Vec<NamedRule> {
    let mut out = Vec::new();
    let mut rest = src;
    while !rest.is_empty() {
        let lower = rest.trim_start().to_ascii_lowercase();
        if lower.starts_with("regex:") || lower.starts_with("not_regex:") {
            out.push(NamedRule::parse(rest.trim()));
            break;
        }
        let (head, tail) = rest.split_once('|').unwrap_or((rest, ""));
        if !head.trim().is_empty() {
            out.push(NamedRule::parse(head.trim()));
        }
        rest = tail;
    }
    out
}

// ------------------------------- Catalog --------------------------------- //

/// Base type contributed by a type-determining rule name.
pub fn base_type(name: &str) -> Option<Type> {
    let string = |format: &str| Type::formatted(ScalarKind::String, format);
    let ty = match name {
        "array" | "list" => Type::list(Type::unknown()),
        "boolean" | "bool" | "accepted" | "declined" => Type::boolean(),
        "integer" | "int" | "digits" | "digits_between" => Type::integer(),
        "numeric" | "decimal" => Type::float(),
        "string" | "alpha" | "alpha_dash" | "alpha_num" | "json" | "timezone" => Type::string(),
        "email" => string("email"),
        "uuid" => string("uuid"),
        "ulid" => string("ulid"),
        "url" | "active_url" => string("uri"),
        "ip" | "ipv4" => string("ipv4"),
        "ipv6" => string("ipv6"),
        "date" | "date_format" | "before" | "after" | "before_or_equal" | "after_or_equal" => string("date"),
        "password" | "current_password" => string("password"),
        "file" | "image" | "mimes" | "mimetypes" => string("binary"),
        "object" => Type::object(Default::default(), None),
        _ => return None,
    };
    Some(ty)
}

/// Base type contributed by a rule object.
pub fn object_base_type(class: &RuleClass) -> Option<Type> {
    match class {
        RuleClass::Password => base_type("password"),
        RuleClass::Email => base_type("email"),
        _ => None,
    }
}

/// Allowed values of an inclusion rule object.
pub fn object_literals(obj: &RuleObject) -> Option<Vec<Literal>> {
    let mut out = Vec::new();
    for arg in &obj.args {
        out.extend(arg.literals()?);
    }
    Some(out)
}

// ------------------------------ Narrowing -------------------------------- //

/// Narrow `base` to the literal set of an inclusion rule.
///
/// Only `String`, `Integer`, `Float` and `Unknown` bases narrow; others are
/// returned as is. Numeric bases first read string literals as numbers. The
/// enum kind is string when every literal is a string, integer when every
/// literal is an integer, float when integers and floats mix; anything else
/// is `Unknown`.
pub fn narrow(base: Type, literals: Vec<Literal>) -> Type {
    let numeric_base = matches!(base.scalar_kind(), Some(ScalarKind::Integer | ScalarKind::Float));
    let narrowable = base.is_unknown() || numeric_base || base.scalar_kind() == Some(ScalarKind::String);
    if !narrowable || literals.is_empty() {
        return base;
    }
    let literals: Vec<Literal> = if numeric_base {
        literals.into_iter().map(as_number).collect()
    } else {
        literals
    };

    let all = |k: ScalarKind| literals.iter().all(|l| l.kind() == k);
    let narrowed = if all(ScalarKind::String) {
        Type::literal_set(ScalarKind::String, literals)
    } else if all(ScalarKind::Integer) {
        Type::literal_set(ScalarKind::Integer, literals)
    } else if literals.iter().all(|l| matches!(l, Literal::Int(_) | Literal::Float(_))) {
        let floats = literals.into_iter().map(|l| match l {
            Literal::Int(i) => Literal::Float((i as f64).into()),
            other => other,
        });
        Type::literal_set(ScalarKind::Float, floats)
    } else {
        Type::unknown()
    };
    keep_slot(&base, narrowed)
}

fn as_number(l: Literal) -> Literal {
    let Literal::Str(s) = &l else { return l };
    if let Ok(i) = s.trim().parse::<i64>() {
        return Literal::Int(i);
    }
    match s.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => Literal::Float(f.into()),
        _ => l,
    }
}

/// Carry format and bounds over when the narrowed kind is unchanged.
fn keep_slot(base: &Type, mut narrowed: Type) -> Type {
    if let (Kind::Scalar(from), Kind::Scalar(to)) = (&base.kind, &mut narrowed.kind) {
        if from.kind == to.kind {
            to.format = from.format.clone();
            to.minimum = from.minimum;
            to.maximum = from.maximum;
            to.pattern = from.pattern.clone();
        }
    }
    narrowed.required = base.required;
    narrowed.description = base.description.clone();
    narrowed.examples = base.examples.clone();
    narrowed
}

/// Smallest integer written with `n` digits; one digit includes zero.
pub fn smallest_with_digits(n: f64) -> f64 {
    if n <= 1.0 { 0.0 } else { 10f64.powi(n as i32 - 1) }
}

/// Largest integer written with `n` digits.
pub fn largest_with_digits(n: f64) -> f64 {
    10f64.powi(n as i32) - 1.0
}

/// `/^[a-z]+$/i` → `^[a-z]+$`. Patterns without delimiters pass through.
pub fn strip_delimiters(pattern: &str) -> String {
    let p = pattern.trim();
    if let Some(body) = p.strip_prefix('/') {
        if let Some(end) = body.rfind('/') {
            return body[..end].to_string();
        }
    }
    p.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strs(xs: &[&str]) -> Vec<Literal> { xs.iter().map(|s| Literal::Str(s.to_string())).collect() }

    #[test]
    fn pipes_split_except_inside_regex() {
        let rules = split_pipes("required|string|regex:/^(a|b)$/");
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["required", "string", "regex"]);
        assert_eq!(rules[2].raw, "/^(a|b)$/");
        assert_eq!(split_pipes("nullable||min:3")[1].number(0), Some(3.0));
    }

    #[test]
    fn named_rule_params() {
        let r = NamedRule::parse("between:1, 10");
        assert_eq!(r.name, "between");
        assert_eq!(r.params(), ["1", "10"]);
        assert_eq!(r.number(1), Some(10.0));
    }

    #[test]
    fn enum_kind_precedence() {
        let ints = narrow(Type::integer(), vec![Literal::Int(1), Literal::Int(2), Literal::Int(3)]);
        assert_eq!(ints, Type::literal_set(ScalarKind::Integer, [Literal::Int(1), Literal::Int(2), Literal::Int(3)]));

        let s = narrow(Type::string(), strs(&["a", "b"]));
        assert_eq!(s, Type::literal_set(ScalarKind::String, strs(&["a", "b"])));

        // string-form parameters on a numeric base
        let coerced = narrow(Type::integer(), strs(&["1", "2"]));
        assert_eq!(coerced.scalar_kind(), Some(ScalarKind::Integer));

        let mixed = narrow(Type::float(), strs(&["1", "2.5"]));
        assert_eq!(mixed.scalar_kind(), Some(ScalarKind::Float));

        let inconsistent = narrow(Type::unknown(), vec![Literal::Int(1), Literal::Str("a".into())]);
        assert!(inconsistent.is_unknown());

        assert_eq!(narrow(Type::boolean(), strs(&["a"])), Type::boolean());
    }

    #[test]
    fn rule_objects_decode_from_tagged_json() {
        let tok: RuleToken = serde_json::from_value(json!({
            "rule": "in",
            "args": [{ "kind": "scalar", "scalar": "integer", "literals": [1, 2] }]
        })).unwrap();
        let RuleToken::Object(obj) = tok else { panic!("expected a rule object") };
        assert_eq!(obj.class, RuleClass::In);
        assert_eq!(object_literals(&obj), Some(vec![Literal::Int(1), Literal::Int(2)]));

        let tok: RuleToken = serde_json::from_value(json!("required|email")).unwrap();
        assert_eq!(tok, RuleToken::from("required|email"));
    }

    #[test]
    fn delimiters_are_stripped() {
        assert_eq!(strip_delimiters("/^[a-z]+$/i"), "^[a-z]+$");
        assert_eq!(strip_delimiters("^x$"), "^x$");
    }
}

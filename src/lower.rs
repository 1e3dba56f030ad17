//! Lowering: `Type` tree → JSON-Schema-like document.
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use crate::ty::{ArrTy, Kind, ScalarKind, ScalarTy, Type};

pub fn lower_to_schema(t: &Type) -> Value {
    let mut o = match &t.kind {
        Kind::Unknown => json!({}),
        Kind::Scalar(s) => lower_scalar(s),
        Kind::Array(arr) => lower_array(arr),
        Kind::Object(obj) => lower_object(&obj.properties, obj.origin.as_deref()),
        Kind::Union { members } => json!({ "oneOf": members.iter().map(lower_to_schema).collect::<Vec<_>>() }),
    };
    if let Some(description) = &t.description {
        o["description"] = Value::from(description.clone());
    }
    if !t.examples.is_empty() {
        o["examples"] = Value::Array(t.examples.iter().cloned().map(Value::from).collect());
    }
    o
}

// ---- scalar ----
fn lower_scalar(s: &ScalarTy) -> Value {
    let ty = match s.kind {
        ScalarKind::String => "string",
        ScalarKind::Integer => "integer",
        ScalarKind::Float => "number",
        ScalarKind::Bool => "boolean",
        ScalarKind::Null => "null",
    };
    let mut o = json!({ "type": ty });
    if !s.literals.is_empty() {
        o["enum"] = Value::Array(s.literals.iter().map(|l| l.to_json()).collect());
    }
    if let Some(format) = &s.format {
        o["format"] = Value::from(format.clone());
    }
    if let Some(min) = s.minimum {
        o["minimum"] = json_num_pref_i64(min.0);
    }
    if let Some(max) = s.maximum {
        o["maximum"] = json_num_pref_i64(max.0);
    }
    if let Some(pattern) = &s.pattern {
        o["pattern"] = Value::from(pattern.clone());
    }
    o
}

// ---- array ----
fn lower_array(arr: &ArrTy) -> Value {
    if let Some(shape) = &arr.shape {
        let positional = shape.keys().enumerate().all(|(i, k)| k.parse::<usize>() == Ok(i));
        if positional && !shape.is_empty() {
            // tuple via prefixItems
            return json!({
                "type": "array",
                "prefixItems": shape.values().map(lower_to_schema).collect::<Vec<_>>(),
                "minItems": shape.values().filter(|v| v.required).count(),
                "maxItems": shape.len()
            });
        }
        return lower_object(shape, None);
    }
    let item = lower_to_schema(&arr.item_type());
    match arr.key.as_deref() {
        None => json!({ "type": "array", "items": item }),
        Some(key) => {
            let mut o = json!({ "type": "object", "additionalProperties": item });
            let names = lower_to_schema(key);
            if names.get("enum").is_some() || names.get("format").is_some() {
                o["propertyNames"] = names;
            }
            o
        }
    }
}

// ---- object ----
fn lower_object(properties: &IndexMap<String, Type>, origin: Option<&str>) -> Value {
    let mut props = Map::new();
    let mut required: Vec<Value> = Vec::new();
    for (k, t) in properties {
        props.insert(k.clone(), lower_to_schema(t));
        if t.required {
            required.push(Value::from(k.clone()));
        }
    }
    let mut o = json!({ "type": "object", "properties": props });
    if !required.is_empty() {
        o["required"] = Value::Array(required);
    }
    if let Some(origin) = origin {
        o["title"] = Value::from(origin);
    }
    o
}

// Helper: prefer emitting integers when exact
fn json_num_pref_i64(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Literal;

    #[test]
    fn scalars_carry_constraints() {
        let mut t = Type::literal_set(ScalarKind::Integer, [Literal::Int(1), Literal::Int(2)]);
        if let Kind::Scalar(s) = &mut t.kind { s.minimum = Some(0.0.into()); }
        assert_eq!(lower_to_schema(&t), json!({ "type": "integer", "enum": [1, 2], "minimum": 0 }));
        assert_eq!(lower_to_schema(&Type::formatted(ScalarKind::String, "email")), json!({ "type": "string", "format": "email" }));
        assert_eq!(lower_to_schema(&Type::unknown()), json!({}));
    }

    #[test]
    fn objects_list_required_properties() {
        let mut props = IndexMap::new();
        props.insert("id".to_string(), Type::integer().with_required(true));
        props.insert("note".to_string(), Type::string().nullable());
        let schema = lower_to_schema(&Type::object(props, Some("User".into())));
        assert_eq!(schema, json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "note": { "oneOf": [{ "type": "string" }, { "type": "null" }] }
            },
            "required": ["id"],
            "title": "User"
        }));
    }

    #[test]
    fn arrays_lower_by_form() {
        assert_eq!(lower_to_schema(&Type::list(Type::boolean())), json!({ "type": "array", "items": { "type": "boolean" } }));
        let map = Type::keyed(Some(Type::string()), Type::integer());
        assert_eq!(lower_to_schema(&map), json!({ "type": "object", "additionalProperties": { "type": "integer" } }));
        let tuple = Type::from_literal(&serde_json::json!([1, "a"]));
        let schema = lower_to_schema(&tuple);
        assert_eq!(schema["prefixItems"].as_array().unwrap().len(), 2);
        assert_eq!(schema["minItems"], json!(2));
        let record = Type::from_literal(&serde_json::json!({ "a": true }));
        assert_eq!(lower_to_schema(&record)["required"], json!(["a"]));
    }

    #[test]
    fn descriptions_and_examples_are_kept() {
        let mut t = Type::string().with_description(Some("Display name".into()));
        t.examples = vec!["Ada".into()];
        assert_eq!(lower_to_schema(&t), json!({ "type": "string", "description": "Display name", "examples": ["Ada"] }));
    }
}

//! Collection pipeline: higher-order methods on an already typed array.
//!
//! The catalog is closed. Methods outside it answer `None` and the caller
//! decides how to degrade.
use crate::engine::Engine;
use crate::ty::{unwrap, Kind, Literal, ScalarKind, Type};
use crate::walk::Argument;

/// Methods that reorder, regroup or resize without touching element types.
const PASSTHROUGH: &[&str] = &[
    "filter", "reject", "flatten", "groupBy", "sortBy", "sortByDesc", "take", "skip",
    "keyBy", "unique", "reverse", "sort", "sortKeys", "slice", "where", "whereIn",
];

impl<'a> Engine<'a> {
    pub fn resolve_collection_method(&self, name: &str, receiver: &Type, args: &[Argument]) -> Option<Type> {
        let depth = self.config.max_depth;
        let view = unwrap(receiver, depth);
        let arr = view.as_array()?;
        let item = arr.item_type().with_required(false);
        let key = arr.key_type();
        let origin = arr.origin.clone();

        let ty = match name {
            "toArray" | "all" => receiver.clone().with_origin(None),
            "values" => Type::keyed(None, item).with_origin(origin),
            "keys" => Type::list(key.unwrap_or_else(Type::integer)).with_origin(origin),
            "first" | "last" | "get" => {
                let fallback = match args.get(1) {
                    Some(arg) => self.default_value(arg),
                    None => Type::null(),
                };
                Type::union([item, fallback])
            }
            "count" => {
                let mut t = Type::integer();
                if let Kind::Scalar(s) = &mut t.kind { s.minimum = Some(0.0.into()); }
                t
            }
            "isEmpty" | "isNotEmpty" => Type::boolean(),
            "map" => {
                let position = key.clone().unwrap_or_else(Type::integer);
                let mapped = self.callback_return(args.first()?, &[item, position])?;
                Type::keyed(key, mapped.with_required(false)).with_origin(origin)
            }
            "mapWithKeys" => {
                let position = key.unwrap_or_else(Type::integer);
                let pairs = self.callback_return(args.first()?, &[item, position])?;
                let arms = pairs.members().iter()
                    .map(|m| single_entry_map(m, depth).map(|t| t.with_origin(origin.clone())))
                    .collect::<Option<Vec<_>>>()?;
                Type::union(arms)
            }
            "pluck" => {
                let value = self.pluck_from(&item, args.first()?)?;
                let key = match args.get(1) {
                    Some(arg) => Some(self.pluck_from(&item, arg)?),
                    None => None,
                };
                Type::keyed(key, value).with_origin(origin)
            }
            _ if PASSTHROUGH.contains(&name) => receiver.clone(),
            _ => return None,
        };
        Some(ty)
    }

    fn callback_return(&self, callback: &Argument, args: &[Type]) -> Option<Type> {
        self.callables.resolve_callable_return(&callback.expr, args, &callback.scope, self)
    }

    /// A default may be given lazily as a closure.
    fn default_value(&self, arg: &Argument) -> Type {
        self.callback_return(arg, &[]).unwrap_or_else(|| arg.ty.clone())
    }

    /// Union of the item's fields named by the argument (dot paths descend).
    fn pluck_from(&self, item: &Type, arg: &Argument) -> Option<Type> {
        let names: Vec<String> = arg.string_alternatives().into_iter().flatten().collect();
        if names.is_empty() {
            return None;
        }
        let found = names.iter().map(|n| {
            let mut at = item.clone();
            for seg in n.split('.') {
                at = at.field(seg);
            }
            at.with_required(false)
        });
        Some(Type::union(found))
    }
}

/// `[$key => $value]` returned by a `mapWithKeys` callback, as a keyed map.
fn single_entry_map(t: &Type, depth: usize) -> Option<Type> {
    let arr = t.as_array()?;
    if let Some(shape) = &arr.shape {
        if shape.len() == 1 {
            let (k, v) = shape.first()?;
            let key = match k.parse::<i64>() {
                Ok(i) => Type::literal_set(ScalarKind::Integer, [Literal::Int(i)]),
                Err(_) => Type::literal_set(ScalarKind::String, [Literal::Str(k.clone())]),
            };
            return Some(Type::keyed(Some(key), v.clone().with_required(false)));
        }
    }
    let keyed = unwrap(t, depth);
    let arr = keyed.as_array()?;
    Some(Type::keyed(Some(arr.key_type().unwrap_or_else(Type::integer)), arr.item_type()))
}

// ------------------------------- Tests ------------------------------------ //

//! `StaticAnalyzer`: a self-contained host for the engine's expression,
//! callable and declared-method collaborators.
//!
//! It types what can be read off the expression tree itself (literals,
//! pre-typed nodes, array literals, field access, closures) and knows the
//! method sets of the two builder contracts. Anything else is `Unknown`.
use std::collections::HashSet;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::expr::{ArrayItem, Expr, Scope};
use crate::provider::{CallableReturnResolver, Contract, DeclaredMethodResolver, ExpressionTypeResolver};
use crate::ty::{Literal, ScalarKind, Type};

// ------------------------------- Policy ---------------------------------- //

/// ORM-level builder methods (relations, model hydration, model writes).
static ELOQUENT_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // builder factories that open a chain
        "query", "newQuery", "newModelQuery", "on",
        "with", "without", "withOnly", "withCount", "withSum", "withAvg", "withExists",
        "has", "orHas", "doesntHave", "whereHas", "orWhereHas", "whereDoesntHave",
        "whereRelation", "whereBelongsTo", "latest", "oldest", "scopes", "withTrashed",
        "onlyTrashed", "withoutTrashed", "withGlobalScope", "withoutGlobalScopes",
        "find", "findOrFail", "findOrNew", "findMany", "first", "firstOrFail",
        "firstOrNew", "firstOrCreate", "firstWhere", "sole", "create", "forceCreate",
        "updateOrCreate", "get", "all", "cursor", "lazy", "lazyById", "chunk", "chunkById",
        "each", "pluck", "value", "paginate", "simplePaginate", "cursorPaginate",
        "update", "delete", "forceDelete", "increment", "decrement", "toSql", "dd", "dump",
    ]
    .into_iter()
    .collect()
});

/// Raw query builder methods.
static QUERY_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "select", "addSelect", "selectRaw", "distinct", "from", "join", "leftJoin",
        "rightJoin", "crossJoin", "where", "orWhere", "whereNot", "whereIn", "whereNotIn",
        "whereNull", "whereNotNull", "whereBetween", "whereNotBetween", "whereDate",
        "whereColumn", "whereRaw", "whereExists", "whereJsonContains", "groupBy",
        "having", "havingRaw", "orderBy", "orderByDesc", "orderByRaw", "inRandomOrder",
        "reorder", "limit", "offset", "take", "skip", "forPage", "when", "unless", "tap",
        "lockForUpdate", "sharedLock", "get", "first", "find", "value", "pluck", "count",
        "sum", "avg", "average", "min", "max", "exists", "doesntExist", "paginate",
        "simplePaginate", "cursorPaginate", "insert", "insertGetId", "insertOrIgnore",
        "update", "upsert", "delete", "increment", "decrement", "cursor", "lazy",
        "chunk", "each", "toSql", "dd", "dump",
    ]
    .into_iter()
    .collect()
});

/// Stateless reference host. All knowledge comes from the expression tree.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticAnalyzer;

impl StaticAnalyzer {
    pub fn new() -> Self { Self }

    fn array_literal(&self, items: &[ArrayItem], scope: &Scope, outer: &dyn ExpressionTypeResolver) -> Type {
        let mut next_index: i64 = 0;
        let mut shape: IndexMap<String, Type> = IndexMap::new();
        let mut open_keys: Vec<Type> = Vec::new();
        let mut values: Vec<Type> = Vec::with_capacity(items.len());

        for item in items {
            let value = outer.resolve_type(&item.value, scope, outer);
            values.push(value.clone().with_required(false));
            let key = match &item.key {
                None => Some(Literal::Int(next_index)),
                Some(k) => single_literal(&outer.resolve_type(k, scope, outer)),
            };
            match key {
                Some(Literal::Int(i)) => {
                    next_index = i + 1;
                    shape.insert(i.to_string(), value.with_required(true));
                }
                Some(Literal::Str(s)) => {
                    shape.insert(s, value.with_required(true));
                }
                // a computed key: the literal can only be a map
                _ => {
                    let kt = match &item.key {
                        Some(k) => outer.resolve_type(k, scope, outer).with_required(false),
                        None => Type::integer(),
                    };
                    open_keys.push(kt);
                }
            }
        }
        if open_keys.is_empty() {
            return Type::shape(shape);
        }
        let keys = shape.keys().map(|k| match k.parse::<i64>() {
            Ok(_) => Type::integer(),
            Err(_) => Type::string(),
        });
        let key = Type::union(open_keys.into_iter().chain(keys));
        Type::keyed(Some(key), Type::union(values))
    }
}

/// The literal a single-valued string or integer type holds.
fn single_literal(t: &Type) -> Option<Literal> {
    match t.literals()?.as_slice() {
        [lit @ (Literal::Int(_) | Literal::Str(_))] => Some(lit.clone()),
        _ => None,
    }
}

fn field_key(t: &Type) -> Option<String> {
    match single_literal(t)? {
        Literal::Int(i) => Some(i.to_string()),
        Literal::Str(s) => Some(s),
        _ => None,
    }
}

impl ExpressionTypeResolver for StaticAnalyzer {
    fn resolve_type(&self, expr: &Expr, scope: &Scope, outer: &dyn ExpressionTypeResolver) -> Type {
        match expr {
            Expr::Literal { value } => Type::from_literal(value),
            Expr::Typed { ty } => ty.clone(),
            Expr::Var { name } => match scope.lookup(name, scope.end()) {
                Some((pos, value)) => outer.resolve_type(value, &scope.prefix(pos), outer),
                None => Type::unknown(),
            },
            Expr::Array { items } => self.array_literal(items, scope, outer),
            Expr::Index { target, key } => {
                let target = outer.resolve_type(target, scope, outer);
                let key = outer.resolve_type(key, scope, outer);
                match field_key(&key) {
                    Some(name) => target.field(&name),
                    None => match target.as_array() {
                        Some(arr) if arr.shape.is_none() => arr.item_type(),
                        _ => Type::unknown(),
                    },
                }
            }
            Expr::Property { target, name } => outer.resolve_type(target, scope, outer).field(name),
            Expr::Branches { arms } => Type::union(arms.iter().map(|a| outer.resolve_type(a, scope, outer))),
            Expr::Entity { .. }
            | Expr::Call { .. }
            | Expr::StaticCall { .. }
            | Expr::Closure { .. }
            | Expr::Opaque => Type::unknown(),
        }
    }
}

impl CallableReturnResolver for StaticAnalyzer {
    fn resolve_callable_return(
        &self,
        callable: &Expr,
        args: &[Type],
        scope: &Scope,
        outer: &dyn ExpressionTypeResolver,
    ) -> Option<Type> {
        match callable {
            Expr::Closure { params, body } => {
                let mut inner = scope.clone();
                for (i, p) in params.iter().enumerate() {
                    let ty = args.get(i).cloned().unwrap_or_default();
                    inner.assign(p, Expr::typed(ty));
                }
                Some(outer.resolve_type(body, &inner, outer))
            }
            Expr::Var { name } => {
                let (pos, value) = scope.lookup(name, scope.end())?;
                self.resolve_callable_return(value, args, &scope.prefix(pos), outer)
            }
            _ => None,
        }
    }
}

impl DeclaredMethodResolver for StaticAnalyzer {
    fn has_method(&self, contract: Contract, method: &str) -> bool {
        match contract {
            Contract::Eloquent => ELOQUENT_METHODS.contains(method),
            Contract::Query => QUERY_METHODS.contains(method),
        }
    }

    fn resolve_declared_method_return(&self, contract: Contract, method: &str, _args: &[Type]) -> Option<Type> {
        if !self.has_method(contract, method) {
            return None;
        }
        let ty = match method {
            "toSql" => Type::string(),
            "sum" => Type::union([Type::integer(), Type::float()]),
            "avg" | "average" => Type::float().nullable(),
            "min" | "max" => Type::union([Type::integer(), Type::float(), Type::string(), Type::null()]),
            "insert" | "chunk" | "chunkById" | "each" => Type::boolean(),
            "insertOrIgnore" | "update" | "upsert" | "delete" | "forceDelete"
            | "increment" | "decrement" | "insertGetId" => Type::integer(),
            // still a builder, or a debugging dump
            _ => Type::unknown(),
        };
        Some(ty)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(expr: &Expr, scope: &Scope) -> Type {
        let a = StaticAnalyzer::new();
        a.resolve_type(expr, scope, &a)
    }

    #[test]
    fn literal_arrays_become_shapes() {
        let expr = Expr::Array { items: vec![
            ArrayItem { key: Some(Expr::lit(json!("id"))), value: Expr::lit(json!(1)) },
            ArrayItem { key: None, value: Expr::lit(json!("x")) },
        ] };
        let ty = resolve(&expr, &Scope::new());
        let shape = ty.as_array().unwrap().shape.as_ref().unwrap();
        assert_eq!(shape.keys().collect::<Vec<_>>(), ["id", "0"]);
        assert!(shape["id"].required);
    }

    #[test]
    fn computed_keys_make_a_map() {
        let scope = Scope::new().with("k", Expr::typed(Type::string()));
        let expr = Expr::Array { items: vec![ArrayItem { key: Some(Expr::var("k")), value: Expr::lit(json!(true)) }] };
        let ty = resolve(&expr, &scope);
        let arr = ty.as_array().unwrap();
        assert_eq!(arr.key_type(), Some(Type::string()));
        assert_eq!(arr.item_type().scalar_kind(), Some(ScalarKind::Bool));
    }

    #[test]
    fn index_and_property_read_fields() {
        let scope = Scope::new().with("row", Expr::lit(json!({ "id": 7, "tags": ["a"] })));
        let id = resolve(&Expr::var("row").index(Expr::lit(json!("id"))), &scope);
        assert_eq!(id.scalar_kind(), Some(ScalarKind::Integer));
        let tags = resolve(&Expr::Property { target: Box::new(Expr::var("row")), name: "tags".into() }, &scope);
        assert!(tags.as_array().is_some());
        assert!(resolve(&Expr::var("row").index(Expr::var("nope")), &scope).is_unknown());
    }

    #[test]
    fn closures_bind_arguments_positionally() {
        let a = StaticAnalyzer::new();
        let cb = Expr::closure(&["x", "k"], Expr::var("k"));
        let ret = a.resolve_callable_return(&cb, &[Type::string(), Type::integer()], &Scope::new(), &a);
        assert_eq!(ret, Some(Type::integer()));
        let scope = Scope::new().with("f", cb);
        let via_var = a.resolve_callable_return(&Expr::var("f"), &[Type::string()], &scope, &a);
        assert_eq!(via_var, Some(Type::unknown()));
        assert_eq!(a.resolve_callable_return(&Expr::lit(json!(1)), &[], &Scope::new(), &a), None);
    }

    #[test]
    fn declared_returns_follow_contracts() {
        let a = StaticAnalyzer::new();
        assert!(a.has_method(Contract::Query, "where"));
        assert!(!a.has_method(Contract::Eloquent, "where"));
        assert!(a.has_method(Contract::Eloquent, "with"));
        assert!(a.has_method(Contract::Eloquent, "query"));
        assert_eq!(a.resolve_declared_method_return(Contract::Query, "toSql", &[]), Some(Type::string()));
        assert_eq!(a.resolve_declared_method_return(Contract::Query, "insert", &[]), Some(Type::boolean()));
        assert_eq!(a.resolve_declared_method_return(Contract::Eloquent, "frobnicate", &[]), None);
    }
}

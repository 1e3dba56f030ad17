//! Engine façade: holds the collaborators, the policy and the entity cache,
//! and routes an expression to the builder or collection resolvers.
use std::cell::RefCell;

use crate::builder::is_finisher;
use crate::config::Config;
use crate::error::{InferError, Result};
use crate::expr::{Expr, Scope};
use crate::provider::{
    CallableReturnResolver, DeclaredMethodResolver, EntityCache, EntityCatalogProvider,
    ExpressionTypeResolver,
};
use crate::ty::Type;
use crate::walk::{walk, Argument, CallStep};

/// Something the engine degraded instead of failing on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub entity: Option<String>,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{entity}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

pub struct Engine<'a> {
    pub(crate) config: Config,
    pub(crate) catalog: &'a dyn EntityCatalogProvider,
    pub(crate) types: &'a dyn ExpressionTypeResolver,
    pub(crate) callables: &'a dyn CallableReturnResolver,
    pub(crate) methods: &'a dyn DeclaredMethodResolver,
    pub(crate) cache: &'a EntityCache,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl<'a> Engine<'a> {
    /// `host` supplies expression typing, callable returns and declared
    /// builder methods; swap any of them afterwards with the `with_*` setters.
    pub fn new<H>(
        config: Config,
        catalog: &'a dyn EntityCatalogProvider,
        host: &'a H,
        cache: &'a EntityCache,
    ) -> Self
    where
        H: ExpressionTypeResolver + CallableReturnResolver + DeclaredMethodResolver,
    {
        Self {
            config,
            catalog,
            types: host,
            callables: host,
            methods: host,
            cache,
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    pub fn with_types(mut self, types: &'a dyn ExpressionTypeResolver) -> Self {
        self.types = types;
        self
    }

    pub fn with_callables(mut self, callables: &'a dyn CallableReturnResolver) -> Self {
        self.callables = callables;
        self
    }

    pub fn with_methods(mut self, methods: &'a dyn DeclaredMethodResolver) -> Self {
        self.methods = methods;
        self
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn diagnostics(&self) -> Vec<Diagnostic> { self.diagnostics.borrow().clone() }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> { self.diagnostics.take() }

    pub(crate) fn note(&self, entity: Option<&str>, message: impl Into<String>) {
        self.diagnostics.borrow_mut().push(Diagnostic {
            entity: entity.map(str::to_string),
            message: message.into(),
        });
    }

    /// "Not resolvable": an error in strict mode, a diagnostic otherwise.
    pub(crate) fn unresolved<T>(&self, entity: Option<&str>, what: impl Into<String>) -> Result<Option<T>> {
        let what = what.into();
        if self.config.strict {
            return Err(InferError::Unresolvable {
                what: match entity {
                    Some(e) => format!("{what} (entity `{e}`)"),
                    None => what,
                },
            });
        }
        self.note(entity, format!("cannot resolve {what}"));
        Ok(None)
    }

    pub fn argument(&self, expr: &Expr, scope: &Scope) -> Argument {
        Argument::new(expr.clone(), self.resolve_type(expr, scope, self), scope.clone())
    }

    // ------------------------------ Inference ---------------------------- //

    /// Type of an arbitrary expression. Builder chains are cut at their first
    /// finisher; the remaining steps run through the collection resolver.
    pub fn infer(&self, expr: &Expr, scope: &Scope) -> Result<Type> {
        self.infer_within(expr, scope, self.config.max_depth)
    }

    /// Chain length and positional variable hops are finite and free; only
    /// nesting through branch arms spends the budget.
    fn infer_within(&self, expr: &Expr, scope: &Scope, budget: usize) -> Result<Type> {
        if budget == 0 {
            return Ok(Type::unknown());
        }
        match expr {
            Expr::Call { .. } | Expr::StaticCall { .. } => self.infer_chain(expr, scope, budget),
            Expr::Var { name } => match scope.lookup(name, scope.end()) {
                Some((pos, value)) => self.infer_within(value, &scope.prefix(pos), budget),
                None => Ok(self.types.resolve_type(expr, scope, self)),
            },
            Expr::Branches { arms } => {
                let mut types = Vec::with_capacity(arms.len());
                for arm in arms {
                    types.push(self.infer_within(arm, scope, budget - 1)?);
                }
                // branches stay apart: each arm may be a distinct literal set
                Ok(Type::union(types))
            }
            _ => Ok(self.types.resolve_type(expr, scope, self)),
        }
    }

    fn infer_chain(&self, expr: &Expr, scope: &Scope, budget: usize) -> Result<Type> {
        let chain = walk(expr, scope, self);
        if chain.root.is_some() {
            let cut = chain.steps.iter().position(|s| is_finisher(&s.name));
            return match cut {
                Some(k) if k + 1 < chain.steps.len() => {
                    let Some(mut ty) = self.resolve_result(&chain.through(k))? else {
                        return Ok(Type::unknown());
                    };
                    for step in &chain.steps[k + 1..] {
                        ty = self.apply_collection_step(&ty, step)?;
                    }
                    Ok(ty)
                }
                _ => Ok(self.resolve_result(&chain)?.unwrap_or_default()),
            };
        }
        match expr {
            Expr::Call { receiver, method, args } => {
                let receiver_ty = self.infer_within(receiver, scope, budget)?;
                let args: Vec<Argument> = args.iter().map(|a| self.argument(a, scope)).collect();
                match self.resolve_collection_method(method, &receiver_ty, &args) {
                    Some(ty) => Ok(ty),
                    None => Ok(self.types.resolve_type(expr, scope, self)),
                }
            }
            _ => Ok(self.types.resolve_type(expr, scope, self)),
        }
    }

    fn apply_collection_step(&self, receiver: &Type, step: &CallStep) -> Result<Type> {
        match self.resolve_collection_method(&step.name, receiver, &step.args) {
            Some(ty) => Ok(ty),
            None => Ok(self
                .unresolved(None, format!("collection method `{}`", step.name))?
                .unwrap_or_default()),
        }
    }
}

/// The engine types sub-expressions for the walker and for collaborators
/// that recurse; failures degrade to `Unknown` with a diagnostic.
impl ExpressionTypeResolver for Engine<'_> {
    fn resolve_type(&self, expr: &Expr, scope: &Scope, _outer: &dyn ExpressionTypeResolver) -> Type {
        match self.infer(expr, scope) {
            Ok(ty) => ty,
            Err(err) => {
                self.note(None, err.to_string());
                Type::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::analyzer::StaticAnalyzer;
    use crate::catalog::StaticCatalog;
    use crate::ty::{Kind, ScalarKind};

    fn catalog() -> StaticCatalog {
        serde_json::from_value(json!({
            "entities": {
                "User": {
                    "table": "users",
                    "columns": [
                        { "name": "id", "type": "bigint" },
                        { "name": "name", "type": "varchar(255)" },
                        { "name": "email", "type": "varchar(255)", "nullable": true }
                    ]
                }
            }
        })).unwrap()
    }

    #[test]
    fn chain_continues_as_collection_after_finisher() {
        let catalog = catalog();
        let host = StaticAnalyzer::new();
        let cache = EntityCache::new();
        let engine = Engine::new(Config::default(), &catalog, &host, &cache);
        let expr = Expr::static_call("User", "select", vec![Expr::lit(json!(["id", "name"]))])
            .call("get", vec![])
            .call("pluck", vec![Expr::lit(json!("name"))])
            .call("values", vec![]);
        let ty = engine.infer(&expr, &Scope::new()).unwrap();
        let arr = ty.as_array().unwrap();
        assert_eq!(arr.item_type().scalar_kind(), Some(ScalarKind::String));
        assert!(arr.key.is_none());
    }

    #[test]
    fn branches_merge_into_a_union() {
        let catalog = catalog();
        let host = StaticAnalyzer::new();
        let cache = EntityCache::new();
        let engine = Engine::new(Config::default(), &catalog, &host, &cache);
        let scope = Scope::new().with("cols", Expr::Branches {
            arms: vec![Expr::lit(json!(["id", "name"])), Expr::lit(json!(["id"]))],
        });
        let expr = Expr::static_call("User", "select", vec![Expr::var("cols")]).call("first", vec![]);
        let ty = engine.infer(&expr, &scope).unwrap();
        // two projections plus null
        assert_eq!(ty.members().len(), 3);
        assert!(ty.members().iter().any(Type::is_null));
    }

    #[test]
    fn receiver_without_root_uses_collection_methods() {
        let catalog = catalog();
        let host = StaticAnalyzer::new();
        let cache = EntityCache::new();
        let engine = Engine::new(Config::default(), &catalog, &host, &cache);
        let scope = Scope::new().with("xs", Expr::lit(json!([1, 2, 3])));
        let ty = engine.infer(&Expr::var("xs").call("first", vec![]), &scope).unwrap();
        assert!(matches!(ty.kind, Kind::Union { .. }));
        assert!(ty.members().iter().any(|m| m.scalar_kind() == Some(ScalarKind::Integer)));
    }

    #[test]
    fn reassigned_filters_do_not_exhaust_the_budget() {
        let catalog = catalog();
        let host = StaticAnalyzer::new();
        let cache = EntityCache::new();
        let engine = Engine::new(Config::default(), &catalog, &host, &cache);
        let mut scope = Scope::new().with("q", Expr::static_call("User", "query", vec![]));
        for _ in 0..12 {
            scope.assign("q", Expr::var("q").call("where", vec![Expr::lit(json!("id")), Expr::lit(json!(1))]));
        }
        let ty = engine.infer(&Expr::var("q").call("get", vec![]), &scope).unwrap();
        let row = ty.as_array().unwrap().item_type();
        assert_eq!(row.as_object().unwrap().origin.as_deref(), Some("User"));
        assert!(engine.diagnostics().is_empty());
    }

    #[test]
    fn strict_mode_surfaces_unresolvable_tails() {
        let catalog = catalog();
        let host = StaticAnalyzer::new();
        let cache = EntityCache::new();
        let strict = Config { strict: true, ..Config::default() };
        let engine = Engine::new(strict, &catalog, &host, &cache);
        let expr = Expr::static_call("User", "get", vec![]).call("frobnicate", vec![]);
        let err = engine.infer(&expr, &Scope::new()).unwrap_err();
        assert!(matches!(err, InferError::Unresolvable { .. }));

        let lenient = Engine::new(Config::default(), &catalog, &host, &cache);
        assert!(lenient.infer(&expr, &Scope::new()).unwrap().is_unknown());
        assert_eq!(lenient.diagnostics().len(), 1);
    }
}

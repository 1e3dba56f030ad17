//! Expression walker: recover `(root entity, call steps)` from a fluent chain.
//!
//! The walk descends the receiver side of each call, following variables to
//! their last preceding assignment, until it reaches a statically known
//! entity. Steps come back in application order (innermost call first).
//!
//! No depth budget applies: the expression tree is finite and every variable
//! lookup only sees assignments strictly before the current position.
use crate::expr::{Expr, Scope};
use crate::provider::ExpressionTypeResolver;
use crate::ty::Type;

/// A resolved call argument. Keeps the source expression (callbacks need it)
/// and the scope it was written in.
#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    pub expr: Expr,
    pub ty: Type,
    pub scope: Scope,
}

impl Argument {
    pub fn new(expr: Expr, ty: Type, scope: Scope) -> Self {
        Self { expr, ty, scope }
    }

    /// Typed argument without source, for hosts that already resolved it.
    pub fn of_type(ty: Type) -> Self {
        Self { expr: Expr::Typed { ty: ty.clone() }, ty, scope: Scope::new() }
    }

    /// Element types of a literal array argument, in order.
    pub fn items(&self) -> Option<Vec<&Type>> {
        self.ty.as_array()?.shape.as_ref().map(|shape| shape.values().collect())
    }

    pub fn string_alternatives(&self) -> Vec<Vec<String>> {
        self.ty.string_alternatives()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallStep {
    pub name: String,
    pub args: Vec<Argument>,
}

impl CallStep {
    pub fn arg_types(&self) -> Vec<Type> {
        self.args.iter().map(|a| a.ty.clone()).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Walk {
    /// `None` when the chain does not bottom out at a known entity.
    pub root: Option<String>,
    pub steps: Vec<CallStep>,
}

impl Walk {
    pub fn last(&self) -> Option<&CallStep> { self.steps.last() }

    /// The chain up to and including step `n` (zero based).
    pub fn through(&self, n: usize) -> Walk {
        Walk {
            root: self.root.clone(),
            steps: self.steps.iter().take(n + 1).cloned().collect(),
        }
    }
}

pub fn walk(expr: &Expr, scope: &Scope, types: &dyn ExpressionTypeResolver) -> Walk {
    let mut steps = Vec::new();
    let root = descend(expr, scope, types, &mut steps);
    steps.reverse();
    Walk { root, steps }
}

fn descend(
    expr: &Expr,
    scope: &Scope,
    types: &dyn ExpressionTypeResolver,
    steps: &mut Vec<CallStep>,
) -> Option<String> {
    match expr {
        Expr::Call { receiver, method, args } => {
            steps.push(step(method, args, scope, types));
            descend(receiver, scope, types, steps)
        }
        // `Entity::method()` is a call on a fresh builder for the entity.
        Expr::StaticCall { entity, method, args } => {
            steps.push(step(method, args, scope, types));
            Some(entity.clone())
        }
        Expr::Entity { name } => Some(name.clone()),
        Expr::Var { name } => {
            let (pos, value) = scope.lookup(name, scope.end())?;
            descend(value, &scope.prefix(pos), types, steps)
        }
        _ => None,
    }
}

fn step(method: &str, args: &[Expr], scope: &Scope, types: &dyn ExpressionTypeResolver) -> CallStep {
    CallStep {
        name: method.to_string(),
        args: args.iter()
            .map(|a| Argument::new(a.clone(), types.resolve_type(a, scope, types), scope.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Literals;

    impl ExpressionTypeResolver for Literals {
        fn resolve_type(&self, expr: &Expr, _: &Scope, _: &dyn ExpressionTypeResolver) -> Type {
            match expr {
                Expr::Literal { value } => Type::from_literal(value),
                _ => Type::unknown(),
            }
        }
    }

    fn names(w: &Walk) -> Vec<&str> {
        w.steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn steps_come_back_in_application_order() {
        let expr = Expr::static_call("User", "select", vec![Expr::lit(json!("id"))])
            .call("where", vec![Expr::lit(json!("active")), Expr::lit(json!(true))])
            .call("get", vec![]);
        let w = walk(&expr, &Scope::new(), &Literals);
        assert_eq!(w.root.as_deref(), Some("User"));
        assert_eq!(names(&w), ["select", "where", "get"]);
        assert_eq!(w.steps[0].args[0].string_alternatives(), vec![vec!["id".to_string()]]);
    }

    #[test]
    fn variables_follow_their_previous_assignment() {
        let scope = Scope::new()
            .with("q", Expr::entity("Post"))
            .with("q", Expr::var("q").call("where", vec![]))
            .with("q", Expr::var("q").call("latest", vec![]));
        let w = walk(&Expr::var("q").call("first", vec![]), &scope, &Literals);
        assert_eq!(w.root.as_deref(), Some("Post"));
        assert_eq!(names(&w), ["where", "latest", "first"]);
    }

    #[test]
    fn unknown_origin_has_no_root() {
        let w = walk(&Expr::var("items").call("map", vec![]), &Scope::new(), &Literals);
        assert!(w.root.is_none());
        assert_eq!(names(&w), ["map"]);
    }

    #[test]
    fn self_referencing_variable_is_unbound() {
        // positional lookup: the right-hand `q` sees nothing before it
        let scope = Scope::new().with("q", Expr::var("q").call("where", vec![]));
        let w = walk(&Expr::var("q"), &scope, &Literals);
        assert!(w.root.is_none());
    }

    #[test]
    fn long_chains_and_reassignments_still_reach_the_root() {
        let deep = (0..50).fold(Expr::entity("User"), |e, _| e.call("where", vec![]));
        let w = walk(&deep, &Scope::new(), &Literals);
        assert_eq!(w.root.as_deref(), Some("User"));
        assert_eq!(w.steps.len(), 50);

        let mut scope = Scope::new().with("q", Expr::static_call("User", "query", vec![]));
        for _ in 0..30 {
            scope.assign("q", Expr::var("q").call("where", vec![Expr::lit(json!("id")), Expr::lit(json!(1))]));
        }
        let w = walk(&Expr::var("q").call("get", vec![]), &scope, &Literals);
        assert_eq!(w.root.as_deref(), Some("User"));
        assert_eq!(w.steps.len(), 32);
        assert_eq!(w.steps[0].name, "query");
    }

    #[test]
    fn literal_array_arguments_expose_items() {
        let arg = Argument::of_type(Type::from_literal(&json!(["id", "name"])));
        assert_eq!(arg.items().unwrap().len(), 2);
        assert!(Argument::of_type(Type::string()).items().is_none());
    }
}

//! Expression nodes handed over by the source analyzer, and the scope of
//! variable assignments they are evaluated in.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::ty::Type;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Statically known entity reference (e.g. a model class).
    Entity { name: String },
    Var { name: String },
    /// `receiver->method(args)`
    Call {
        receiver: Box<Expr>,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `Entity::method(args)`
    StaticCall {
        entity: String,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Literal { value: Value },
    /// Sub-expression whose type the host already knows.
    Typed { ty: Type },
    /// Array literal; entries without a key are positional.
    Array { items: Vec<ArrayItem> },
    Index { target: Box<Expr>, key: Box<Expr> },
    Property { target: Box<Expr>, name: String },
    Closure {
        #[serde(default)]
        params: Vec<String>,
        body: Box<Expr>,
    },
    /// A value that depends on control flow: one arm per branch.
    Branches { arms: Vec<Expr> },
    /// Anything the host could not describe.
    Opaque,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Expr>,
    pub value: Expr,
}

impl Expr {
    pub fn entity(name: &str) -> Self { Expr::Entity { name: name.to_string() } }
    pub fn var(name: &str) -> Self { Expr::Var { name: name.to_string() } }
    pub fn lit(value: Value) -> Self { Expr::Literal { value } }
    pub fn typed(ty: Type) -> Self { Expr::Typed { ty } }

    pub fn call(self, method: &str, args: Vec<Expr>) -> Self {
        Expr::Call { receiver: Box::new(self), method: method.to_string(), args }
    }

    pub fn static_call(entity: &str, method: &str, args: Vec<Expr>) -> Self {
        Expr::StaticCall { entity: entity.to_string(), method: method.to_string(), args }
    }

    pub fn closure(params: &[&str], body: Expr) -> Self {
        Expr::Closure {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Box::new(body),
        }
    }

    pub fn index(self, key: Expr) -> Self {
        Expr::Index { target: Box::new(self), key: Box::new(key) }
    }
}

// -------------------------------- Scope ---------------------------------- //

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
}

/// Assignments in program order. A reference sees only assignments made
/// before it, so `$q = $q->where(..)` refers back to the previous `$q`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope {
    assignments: Vec<Assignment>,
}

/// Position in a scope: assignments strictly before it are visible.
pub type ScopePos = usize;

impl Scope {
    pub fn new() -> Self { Self::default() }

    pub fn assign(&mut self, name: &str, value: Expr) -> &mut Self {
        self.assignments.push(Assignment { name: name.to_string(), value });
        self
    }

    pub fn with(mut self, name: &str, value: Expr) -> Self {
        self.assign(name, value);
        self
    }

    /// Position after every assignment.
    pub fn end(&self) -> ScopePos { self.assignments.len() }

    /// The scope as it stood at `pos`.
    pub fn prefix(&self, pos: ScopePos) -> Scope {
        Scope { assignments: self.assignments[..pos.min(self.assignments.len())].to_vec() }
    }

    /// Last assignment to `name` strictly before `before`, with its position.
    pub fn lookup(&self, name: &str, before: ScopePos) -> Option<(ScopePos, &Expr)> {
        self.assignments[..before.min(self.assignments.len())]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, a)| a.name == name)
            .map(|(i, a)| (i, &a.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_sees_only_earlier_assignments() {
        let scope = Scope::new()
            .with("q", Expr::entity("User"))
            .with("q", Expr::var("q").call("where", vec![]));
        let (pos, last) = scope.lookup("q", scope.end()).unwrap();
        assert_eq!(pos, 1);
        assert!(matches!(last, Expr::Call { .. }));
        let (pos, first) = scope.lookup("q", pos).unwrap();
        assert_eq!(pos, 0);
        assert_eq!(first, &Expr::entity("User"));
        assert!(scope.lookup("q", 0).is_none());
        assert_eq!(scope.prefix(1).end(), 1);
    }

    #[test]
    fn expressions_decode_from_tagged_json() {
        let expr: Expr = serde_json::from_value(json!({
            "kind": "call",
            "receiver": { "kind": "static_call", "entity": "User", "method": "select",
                          "args": [{ "kind": "literal", "value": "id" }] },
            "method": "get"
        })).unwrap();
        let expected = Expr::static_call("User", "select", vec![Expr::lit(json!("id"))])
            .call("get", vec![]);
        assert_eq!(expr, expected);
    }
}

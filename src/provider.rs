//! Collaborators the engine is given by its host, and the entity cache.
//!
//! The engine never reflects over application code. Everything it knows
//! about entities, enumerations, sub-expressions and declared method return
//! types arrives through these traits.
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::expr::{Expr, Scope};
use crate::ty::{Literal, ScalarKind, Type};

// ------------------------------- Catalog --------------------------------- //

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    /// When non-empty, only these columns are serialized.
    #[serde(default)]
    pub visible: BTreeSet<String>,
    #[serde(default)]
    pub hidden: BTreeSet<String>,
}

impl Visibility {
    pub fn allows(&self, name: &str) -> bool {
        !self.hidden.contains(name) && (self.visible.is_empty() || self.visible.contains(name))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub target: String,
    /// To-many relations load a list of rows; to-one a nullable row.
    #[serde(default)]
    pub many: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    pub backing: ScalarKind,
    pub values: Vec<Literal>,
}

pub trait EntityCatalogProvider {
    fn get_columns(&self, entity: &str) -> Result<Vec<Column>, CatalogError>;

    fn get_visibility(&self, _entity: &str) -> Visibility {
        Visibility::default()
    }

    /// Table backing the entity; used to honor `table.column` qualifiers.
    fn table_name(&self, _entity: &str) -> Option<String> {
        None
    }

    fn get_relation(&self, _entity: &str, _name: &str) -> Option<Relation> {
        None
    }

    fn get_enum(&self, name: &str) -> Result<EnumDescriptor, CatalogError> {
        Err(CatalogError::UnknownEnum(name.to_string()))
    }
}

// ------------------------------ Expressions ------------------------------ //

/// Types arbitrary sub-expressions. `outer` is the resolver to recurse with,
/// so nested call chains can go back through the engine.
pub trait ExpressionTypeResolver {
    fn resolve_type(&self, expr: &Expr, scope: &Scope, outer: &dyn ExpressionTypeResolver) -> Type;
}

/// Computes what a callable returns for the given positional argument types.
/// `None` when `callable` is not something callable.
pub trait CallableReturnResolver {
    fn resolve_callable_return(
        &self,
        callable: &Expr,
        args: &[Type],
        scope: &Scope,
        outer: &dyn ExpressionTypeResolver,
    ) -> Option<Type>;
}

/// The two canonical builder contracts a chain step may belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contract {
    /// ORM-level builder (relations, model hydration).
    Eloquent,
    /// Raw query builder.
    Query,
}

impl Contract {
    /// Lookup order for declared-method fallbacks.
    pub const ORDER: [Contract; 2] = [Contract::Eloquent, Contract::Query];
}

pub trait DeclaredMethodResolver {
    fn has_method(&self, contract: Contract, method: &str) -> bool;

    fn resolve_declared_method_return(
        &self,
        contract: Contract,
        method: &str,
        args: &[Type],
    ) -> Option<Type>;
}

// -------------------------------- Cache ---------------------------------- //

/// What a cached row depends on: the entity and the policy it was built
/// under. A lenient engine may cache a degraded row that a strict one must
/// not see.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub entity: String,
    pub max_depth: usize,
    pub strict: bool,
}

impl RowKey {
    pub fn new(entity: &str, config: &Config) -> Self {
        Self { entity: entity.to_string(), max_depth: config.max_depth, strict: config.strict }
    }
}

/// Memoized full rows keyed by entity and policy.
///
/// Valid for the lifetime of the process that filled it; entries are never
/// invalidated. Interior mutability is a `RefCell`, so a cache belongs to one
/// thread; a multi-threaded host keeps one cache per thread or serializes
/// writes per key itself.
#[derive(Debug, Default)]
pub struct EntityCache {
    rows: RefCell<HashMap<RowKey, Type>>,
}

impl EntityCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &RowKey) -> Option<Type> {
        self.rows.borrow().get(key).cloned()
    }

    /// Compute once, then read. Failures are not cached.
    pub fn get_or_try_insert<E>(
        &self,
        key: RowKey,
        compute: impl FnOnce() -> std::result::Result<Type, E>,
    ) -> std::result::Result<Type, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let row = compute()?;
        self.rows.borrow_mut().entry(key).or_insert(row.clone());
        Ok(row)
    }

    pub fn len(&self) -> usize { self.rows.borrow().len() }

    pub fn is_empty(&self) -> bool { self.rows.borrow().is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_computes_once() {
        let cache = EntityCache::new();
        let key = RowKey::new("User", &Config::default());
        let mut calls = 0;
        for _ in 0..3 {
            let row = cache.get_or_try_insert::<()>(key.clone(), || { calls += 1; Ok(Type::integer()) });
            assert_eq!(row, Ok(Type::integer()));
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_skips_failures() {
        let cache = EntityCache::new();
        let err = cache.get_or_try_insert(RowKey::new("User", &Config::default()), || Err("boom"));
        assert_eq!(err, Err("boom"));
        assert!(cache.is_empty());
    }

    #[test]
    fn rows_are_kept_apart_per_policy() {
        let cache = EntityCache::new();
        let lenient = RowKey::new("User", &Config::default());
        let strict = RowKey::new("User", &Config { strict: true, ..Config::default() });
        let shallow = RowKey::new("User", &Config { max_depth: 2, ..Config::default() });
        cache.get_or_try_insert::<()>(lenient.clone(), || Ok(Type::integer())).unwrap();
        assert_eq!(cache.get(&lenient), Some(Type::integer()));
        assert_eq!(cache.get(&strict), None);
        assert_eq!(cache.get(&shallow), None);
    }

    #[test]
    fn visibility_prefers_hidden() {
        let vis = Visibility {
            visible: ["id".to_string(), "password".to_string()].into(),
            hidden: ["password".to_string()].into(),
        };
        assert!(vis.allows("id"));
        assert!(!vis.allows("password"));
        assert!(!vis.allows("email"));
    }
}

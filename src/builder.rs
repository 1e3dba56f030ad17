//! Builder semantics: interpret a call chain rooted at an entity against the
//! entity's column catalog.
//!
//! - Steps are either chain-continuations or finishers; a finisher anywhere
//!   but last makes the chain unresolvable as a builder.
//! - `select`/`addSelect` keep a list of projection variants, one row type
//!   per variant.
//! - The last step maps the row to the chain's result (list, nullable row,
//!   page envelope, scalar, ...), falling back to the declared contracts.
pub mod projection;
pub mod paginator;

use std::collections::HashSet;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::engine::Engine;
use crate::error::{InferError, Result};
use crate::provider::{Column, Contract, RowKey};
use crate::ty::{Kind, Type, COLLECTION_ORIGIN};
use crate::walk::{Argument, Walk};

pub use paginator::PageKind;
pub use projection::{ColumnRef, Projection};

// ------------------------------- Policy ---------------------------------- //

/// Methods that execute the query (fetch, aggregate, mutate, existence check).
static FINISHERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "get", "all", "cursor", "lazy", "lazyById", "chunk", "chunkById", "each",
        "first", "firstOrFail", "firstOrNew", "firstOrCreate", "firstWhere", "sole",
        "find", "findOrFail", "findOrNew", "findMany", "value", "pluck",
        "count", "sum", "avg", "average", "min", "max", "exists", "doesntExist",
        "paginate", "simplePaginate", "cursorPaginate",
        "insert", "insertGetId", "insertOrIgnore", "update", "updateOrCreate", "upsert",
        "delete", "forceDelete", "create", "forceCreate", "increment", "decrement",
        "toSql", "dd", "dump",
    ]
    .into_iter()
    .collect()
});

pub fn is_finisher(name: &str) -> bool {
    FINISHERS.contains(name)
}

/// Eager-load paths from `with(...)`, as a tree of relation names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationTree(IndexMap<String, RelationTree>);

impl RelationTree {
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// `"posts.author:id,name"` → posts → author.
    pub fn insert_path(&mut self, path: &str) {
        let mut node = self;
        for seg in path.split('.') {
            let name = seg.split(':').next().unwrap_or(seg).trim();
            if name.is_empty() { return; }
            node = node.0.entry(name.to_string()).or_default();
        }
    }

    fn add_argument(&mut self, arg: &Argument) {
        let alts = arg.string_alternatives();
        if !alts.is_empty() {
            for path in alts.iter().flatten() { self.insert_path(path); }
            return;
        }
        // `with(['posts' => fn ($q) => ...])`: relation names are the keys
        if let Some(shape) = arg.ty.as_array().and_then(|a| a.shape.as_ref()) {
            for key in shape.keys().filter(|k| k.parse::<usize>().is_err()) {
                self.insert_path(key);
            }
        }
    }
}

// ------------------------------ Resolution ------------------------------- //

impl<'a> Engine<'a> {
    /// Row type produced by the chain, or `None` when it is not a pure
    /// builder chain.
    pub fn resolve_row(&self, walk: &Walk) -> Result<Option<Type>> {
        let Some(entity) = walk.root.as_deref() else {
            return self.unresolved(None, "builder chain without a known root entity");
        };
        let last = walk.steps.len().saturating_sub(1);
        if let Some(step) = walk.steps.iter().take(last).find(|s| is_finisher(&s.name)) {
            return self.unresolved(Some(entity), format!("chain finished early by `{}`", step.name));
        }
        if self.config.verify_builder_methods {
            let unknown = walk.steps.iter()
                .find(|s| !Contract::ORDER.iter().any(|c| self.methods.has_method(*c, &s.name)));
            if let Some(step) = unknown {
                return self.unresolved(Some(entity), format!("`{}` is not a builder method", step.name));
            }
        }

        let mut variants = vec![Projection::everything()];
        let mut relations = RelationTree::default();
        for step in &walk.steps {
            match step.name.as_str() {
                "select" => variants = projection::apply_select(&step.args),
                "addSelect" => variants = projection::apply_add_select(&variants, &step.args),
                "get" | "first" if !step.args.is_empty() => {
                    variants = projection::apply_select(&step.args[..1]);
                }
                "with" => step.args.iter().for_each(|a| relations.add_argument(a)),
                _ => {}
            }
        }

        let budget = self.config.max_depth;
        let unprojected = variants == [Projection::everything()];
        let rows = if unprojected {
            vec![self.entity_row(entity, budget)?]
        } else {
            let columns = self.catalog_columns(entity)?;
            let mut rows = Vec::with_capacity(variants.len());
            for v in &variants {
                rows.push(self.project(entity, &columns, v, budget)?);
            }
            rows
        };
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.attach_relations(row, entity, &relations, budget)?);
        }
        Ok(Some(Type::union(out)))
    }

    /// Result of the whole chain, keyed on its last step.
    pub fn resolve_result(&self, walk: &Walk) -> Result<Option<Type>> {
        let Some(terminal) = walk.last() else {
            return self.unresolved(walk.root.as_deref(), "bare entity reference");
        };
        let Some(row) = self.resolve_row(walk)? else {
            return Ok(None);
        };
        let entity = walk.root.as_deref().unwrap_or_default();
        let name = terminal.name.as_str();
        let collection = Some(COLLECTION_ORIGIN.to_string());

        let ty = match name {
            "get" | "all" | "cursor" | "lazy" | "lazyById" | "findMany" => {
                Type::list(row).with_origin(collection)
            }
            "pluck" => {
                let columns = self.catalog_columns(entity)?;
                let value = match terminal.args.first() {
                    Some(arg) => self.plucked(entity, &columns, arg)?.unwrap_or_default(),
                    None => Type::unknown(),
                };
                let key = match terminal.args.get(1) {
                    Some(arg) => self.plucked(entity, &columns, arg)?,
                    None => None,
                };
                Type::keyed(key, value).with_origin(collection)
            }
            "first" | "firstWhere" | "find" | "latest" | "oldest" => row.nullable(),
            "sole" | "create" | "forceCreate" | "updateOrCreate" => row,
            _ if ["OrFail", "OrNew", "OrCreate"].iter().any(|s| name.ends_with(s)) => row,
            "value" => {
                let columns = self.catalog_columns(entity)?;
                match terminal.args.first() {
                    Some(arg) => self.plucked(entity, &columns, arg)?.unwrap_or_default().nullable(),
                    None => Type::unknown(),
                }
            }
            "count" => {
                let mut t = Type::integer();
                if let Kind::Scalar(s) = &mut t.kind { s.minimum = Some(0.0.into()); }
                t
            }
            "exists" | "doesntExist" => Type::boolean(),
            _ => match PageKind::from_method(name) {
                Some(kind) => paginator::envelope(kind, row),
                None => return self.declared_return(entity, name, &terminal.arg_types()),
            },
        };
        Ok(Some(ty))
    }

    /// ORM contract first, raw query contract second.
    fn declared_return(&self, entity: &str, method: &str, args: &[Type]) -> Result<Option<Type>> {
        let found = Contract::ORDER.iter()
            .find_map(|c| self.methods.resolve_declared_method_return(*c, method, args));
        match found {
            Some(ty) => Ok(Some(ty)),
            None => self.unresolved(Some(entity), format!("builder method `{method}`")),
        }
    }

    // ------------------------------ Rows -------------------------------- //

    /// Catalog columns; a failing catalog degrades to no columns unless strict.
    pub(crate) fn catalog_columns(&self, entity: &str) -> Result<Vec<Column>> {
        match self.catalog.get_columns(entity) {
            Ok(columns) => Ok(columns),
            Err(source) if self.config.strict => Err(InferError::Catalog {
                entity: entity.to_string(),
                source,
            }),
            Err(source) => {
                self.note(Some(entity), format!("catalog unavailable: {source}"));
                Ok(Vec::new())
            }
        }
    }

    /// Full row of `entity`. Rows computed with the whole budget are cached.
    pub(crate) fn entity_row(&self, entity: &str, budget: usize) -> Result<Type> {
        if budget == 0 {
            return Ok(Type::unknown());
        }
        let build = || {
            let columns = self.catalog_columns(entity)?;
            self.project(entity, &columns, &Projection::everything(), budget)
        };
        if budget == self.config.max_depth {
            self.cache.get_or_try_insert(RowKey::new(entity, &self.config), build)
        } else {
            build()
        }
    }

    fn project(&self, entity: &str, columns: &[Column], projection: &Projection, budget: usize) -> Result<Type> {
        let visibility = self.catalog.get_visibility(entity);
        let table = self.catalog.table_name(entity);
        let mut props: IndexMap<String, Type> = IndexMap::new();

        let add_all = |props: &mut IndexMap<String, Type>| -> Result<()> {
            for col in columns.iter().filter(|c| visibility.allows(&c.name)) {
                props.insert(col.name.clone(), self.column_type(col, budget)?);
            }
            Ok(())
        };
        if projection.all {
            add_all(&mut props)?;
        }
        for cref in &projection.columns {
            if cref.is_wildcard() {
                if cref.is_local(table.as_deref()) { add_all(&mut props)?; }
                continue;
            }
            let name = cref.output_name();
            if !visibility.allows(name) {
                continue;
            }
            let ty = self.column_ref_type(columns, cref, table.as_deref(), budget)?;
            props.insert(name.to_string(), ty.with_required(true));
        }
        Ok(Type::object(props, Some(entity.to_string())))
    }

    fn column_ref_type(&self, columns: &[Column], cref: &ColumnRef, table: Option<&str>, budget: usize) -> Result<Type> {
        if !cref.is_local(table) {
            return Ok(Type::unknown());
        }
        match columns.iter().find(|c| c.name == cref.column) {
            Some(col) => self.column_type(col, budget),
            None => Ok(Type::unknown()),
        }
    }

    fn column_type(&self, col: &Column, budget: usize) -> Result<Type> {
        let ty = self.expand_entities(&col.ty, budget.saturating_sub(1))?;
        let ty = if col.nullable { ty.nullable() } else { ty };
        Ok(ty.with_required(true))
    }

    /// Replace entity references (property-less objects tagged with an
    /// entity name) by that entity's row, within the remaining budget.
    fn expand_entities(&self, ty: &Type, budget: usize) -> Result<Type> {
        match &ty.kind {
            Kind::Object(obj) => match obj.entity_ref() {
                Some(target) => {
                    let mut row = self.entity_row(target, budget)?;
                    row.required = ty.required;
                    row.description = ty.description.clone();
                    Ok(row)
                }
                None => Ok(ty.clone()),
            },
            Kind::Union { members } => {
                let mut out = Vec::with_capacity(members.len());
                for m in members { out.push(self.expand_entities(m, budget)?); }
                let mut u = Type::union(out);
                u.required = ty.required;
                Ok(u)
            }
            _ => Ok(ty.clone()),
        }
    }

    fn attach_relations(&self, mut row: Type, entity: &str, tree: &RelationTree, budget: usize) -> Result<Type> {
        if tree.is_empty() || budget == 0 {
            return Ok(row);
        }
        let Kind::Object(obj) = &mut row.kind else {
            return Ok(row);
        };
        let visibility = self.catalog.get_visibility(entity);
        for (name, nested) in &tree.0 {
            if !visibility.allows(name) {
                continue;
            }
            let Some(relation) = self.catalog.get_relation(entity, name) else {
                self.note(Some(entity), format!("unknown relation `{name}`"));
                continue;
            };
            let target = self.entity_row(&relation.target, budget - 1)?;
            let target = self.attach_relations(target, &relation.target, nested, budget - 1)?;
            let ty = if relation.many {
                Type::list(target).with_origin(Some(COLLECTION_ORIGIN.to_string()))
            } else {
                target.nullable()
            };
            obj.properties.insert(name.clone(), ty.with_required(true));
        }
        Ok(row)
    }

    /// Union of the catalog types of the columns a pluck-style argument names.
    fn plucked(&self, entity: &str, columns: &[Column], arg: &Argument) -> Result<Option<Type>> {
        let names: Vec<String> = arg.string_alternatives().into_iter().flatten().collect();
        if names.is_empty() {
            self.note(Some(entity), "pluck argument is not a literal column name");
            return Ok(None);
        }
        let table = self.catalog.table_name(entity);
        let mut types = Vec::with_capacity(names.len());
        for name in &names {
            let cref = ColumnRef::parse(name);
            let ty = self.column_ref_type(columns, &cref, table.as_deref(), self.config.max_depth)?;
            types.push(ty.with_required(false));
        }
        Ok(Some(Type::union(types)))
    }
}

// ------------------------------- Tests ------------------------------------ //

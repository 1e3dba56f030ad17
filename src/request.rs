//! Request documents accepted by the CLI and the fixture runner.
//!
//! ```json
//! { "config": { "strict": true },
//!   "catalog": { "entities": { "User": { "columns": [{ "name": "id", "type": "bigint" }] } } },
//!   "scope": [{ "name": "q", "value": { "kind": "static_call", "entity": "User", "method": "where" } }],
//!   "expr": { "kind": "call", "receiver": { "kind": "var", "name": "q" }, "method": "get" } }
//! ```
//!
//! Rule documents carry `rules` instead of `scope`/`expr`; each value is a
//! pipe string, a list of tokens, or `{ "rules": .., "type": .., "description": .., "examples": .. }`.
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::analyzer::StaticAnalyzer;
use crate::catalog::StaticCatalog;
use crate::config::Config;
use crate::engine::{Diagnostic, Engine};
use crate::error::Result;
use crate::expr::{Expr, Scope};
use crate::lower::lower_to_schema;
use crate::provider::EntityCache;
use crate::rules::{RuleClass, RuleObject, RuleSet, RuleToken};
use crate::ty::Type;

#[derive(Clone, Debug, Deserialize)]
pub struct ChainRequest {
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub catalog: StaticCatalog,
    #[serde(default)]
    pub scope: Scope,
    pub expr: Expr,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RulesRequest {
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub catalog: StaticCatalog,
    pub rules: IndexMap<String, RuleSpec>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    Tokens(TokenList),
    Detailed {
        rules: TokenList,
        #[serde(default, rename = "type")]
        declared: Option<Type>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        examples: Vec<String>,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenList {
    Pipe(String),
    List(Vec<TokenSpec>),
}

/// A rule token as written in a document. Inclusion-style objects may give
/// their allowed values directly as JSON.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenSpec {
    Str(String),
    Values {
        #[serde(flatten)]
        class: RuleClass,
        values: Vec<Value>,
    },
    Object(RuleObject),
}

impl From<TokenSpec> for RuleToken {
    fn from(spec: TokenSpec) -> Self {
        match spec {
            TokenSpec::Str(s) => RuleToken::Str(s),
            TokenSpec::Values { class, values } => RuleToken::Object(RuleObject {
                class,
                args: vec![Type::from_literal(&Value::Array(values))],
            }),
            TokenSpec::Object(obj) => RuleToken::Object(obj),
        }
    }
}

impl From<TokenList> for Vec<RuleToken> {
    fn from(list: TokenList) -> Self {
        match list {
            TokenList::Pipe(s) => vec![RuleToken::Str(s)],
            TokenList::List(xs) => xs.into_iter().map(RuleToken::from).collect(),
        }
    }
}

impl From<RuleSpec> for RuleSet {
    fn from(spec: RuleSpec) -> Self {
        match spec {
            RuleSpec::Tokens(list) => RuleSet::new(Vec::from(list)),
            RuleSpec::Detailed { rules, declared, description, examples } => RuleSet {
                tokens: rules.into(),
                declared,
                description,
                examples,
            },
        }
    }
}

/// Lowered schema plus whatever the engine degraded on the way.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub ty: Type,
    pub schema: Value,
    pub diagnostics: Vec<Diagnostic>,
}

impl ChainRequest {
    pub fn run(&self) -> Result<Outcome> {
        let host = StaticAnalyzer::new();
        let cache = EntityCache::new();
        let engine = Engine::new(self.config.clone(), &self.catalog, &host, &cache);
        let ty = engine.infer(&self.expr, &self.scope)?;
        Ok(Outcome { schema: lower_to_schema(&ty), ty, diagnostics: engine.take_diagnostics() })
    }
}

impl RulesRequest {
    pub fn run(&self) -> Result<Outcome> {
        let host = StaticAnalyzer::new();
        let cache = EntityCache::new();
        let engine = Engine::new(self.config.clone(), &self.catalog, &host, &cache);
        let rules: IndexMap<String, RuleSet> = self.rules.iter()
            .map(|(k, v)| (k.clone(), RuleSet::from(v.clone())))
            .collect();
        let ty = engine.parse_rule_map(&rules)?;
        Ok(Outcome { schema: lower_to_schema(&ty), ty, diagnostics: engine.take_diagnostics() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_request_runs_end_to_end() {
        let req: ChainRequest = serde_json::from_value(json!({
            "catalog": { "entities": { "User": { "columns": [
                { "name": "id", "type": "bigint" },
                { "name": "name", "type": "varchar(255)" }
            ] } } },
            "scope": [{ "name": "q", "value": { "kind": "static_call", "entity": "User", "method": "select",
                        "args": [{ "kind": "literal", "value": ["id", "name"] }] } }],
            "expr": { "kind": "call", "receiver": { "kind": "var", "name": "q" }, "method": "get" }
        })).unwrap();
        let out = req.run().unwrap();
        assert_eq!(out.schema, json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "id": { "type": "integer" }, "name": { "type": "string" } },
                "required": ["id", "name"],
                "title": "User"
            }
        }));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn rule_specs_accept_every_form() {
        let req: RulesRequest = serde_json::from_value(json!({
            "rules": {
                "name": "required",
                "size": ["string", { "rule": "in", "values": ["s", "m"] }],
                "age": { "rules": "required|string", "type": { "kind": "scalar", "scalar": "integer" },
                         "description": "Age in years" }
            }
        })).unwrap();
        let out = req.run().unwrap();
        assert_eq!(out.schema["properties"]["size"]["enum"], json!(["m", "s"]));
        assert_eq!(out.schema["properties"]["age"], json!({ "type": "integer", "description": "Age in years" }));
        assert_eq!(out.schema["required"], json!(["name", "age"]));
    }
}

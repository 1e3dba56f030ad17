//! Validation rule maps → nested structural types.
//!
//! Each key is a dot path (see `path`), each value the rules for that leaf.
//! Leaves are typed in declaration order:
//! - the first type-determining rule wins the base type; no such rule means
//!   the configured default;
//! - inclusion rules narrow the base to a literal set, enum rule objects
//!   replace it with the enumeration's values;
//! - `min`/`max`/`between`/`size` bound numeric leaves, `regex` sets a pattern;
//! - `nullable` and `required` are applied last and compose freely.
//! A declared type on the rule set wins outright; rules then only say
//! whether it is required.
pub mod path;
pub mod token;

use indexmap::IndexMap;

use crate::engine::Engine;
use crate::error::{InferError, Result};
use crate::ty::{Kind, Literal, ScalarKind, Type};

pub use path::Segment;
pub use token::{NamedRule, RuleClass, RuleObject, RuleToken};

/// The rules declared for one path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleSet {
    pub tokens: Vec<RuleToken>,
    /// Explicit type (e.g. from a doc comment) that overrides the rules.
    pub declared: Option<Type>,
    pub description: Option<String>,
    pub examples: Vec<String>,
}

impl RuleSet {
    pub fn new(tokens: impl IntoIterator<Item = RuleToken>) -> Self {
        Self { tokens: tokens.into_iter().collect(), ..Self::default() }
    }

    /// `"required|integer|min:0"`
    pub fn pipe(rules: &str) -> Self {
        Self::new([RuleToken::from(rules)])
    }

    pub fn declared(mut self, ty: Type) -> Self {
        self.declared = Some(ty);
        self
    }
}

/// Leaf facts collected in one pass over the tokens.
#[derive(Default)]
struct LeafFacts {
    base: Option<Type>,
    inclusion: Option<Vec<Literal>>,
    enumeration: Option<Type>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    pattern: Option<String>,
    nullable: bool,
    required: bool,
    confirmed: bool,
}

impl<'a> Engine<'a> {
    /// Fold a whole rule map into one object type.
    pub fn parse_rule_map(&self, rules: &IndexMap<String, RuleSet>) -> Result<Type> {
        let mut root = Type::object(IndexMap::new(), None);
        for (key, set) in rules {
            let segments = path::parse_path(key)?;
            let (leaf, confirmed) = self.leaf_type(key, set)?;
            if confirmed {
                if let Some((Segment::Field(last), parent)) = segments.split_last() {
                    let mut sibling = parent.to_vec();
                    sibling.push(Segment::Field(format!("{last}_confirmation")));
                    path::insert(&mut root, &sibling, leaf.clone());
                }
            }
            path::insert(&mut root, &segments, leaf);
        }
        Ok(root)
    }

    /// Type of a single leaf, and whether it asks for a confirmation sibling.
    fn leaf_type(&self, key: &str, set: &RuleSet) -> Result<(Type, bool)> {
        let mut facts = LeafFacts::default();
        for tok in &set.tokens {
            match tok {
                RuleToken::Str(src) => {
                    for rule in token::split_pipes(src) {
                        self.named_rule(&mut facts, &rule);
                    }
                }
                RuleToken::Object(obj) => self.object_rule(&mut facts, key, obj)?,
            }
        }

        let base = facts.base.take().unwrap_or_else(|| Type::scalar(self.config.default_rule_type));
        let mut ty = match facts.inclusion.take() {
            Some(literals) => token::narrow(base, literals),
            None => base,
        };
        if let Some(enumeration) = facts.enumeration.take() {
            ty = enumeration;
        }
        if let Kind::Scalar(s) = &mut ty.kind {
            if s.kind.is_numeric() {
                s.minimum = facts.minimum.map(Into::into).or(s.minimum);
                s.maximum = facts.maximum.map(Into::into).or(s.maximum);
            }
            if s.kind == ScalarKind::String && facts.pattern.is_some() {
                s.pattern = facts.pattern.take();
            }
        }
        if facts.nullable {
            ty = ty.nullable();
        }

        let ty = match &set.declared {
            Some(declared) => declared.clone(),
            None => ty,
        };
        let mut ty = ty.with_required(facts.required);
        if set.description.is_some() {
            ty.description = set.description.clone();
        }
        if !set.examples.is_empty() {
            ty.examples = set.examples.clone();
        }
        Ok((ty, facts.confirmed))
    }

    fn named_rule(&self, facts: &mut LeafFacts, rule: &NamedRule) {
        match rule.name.as_str() {
            "nullable" => facts.nullable = true,
            "required" => facts.required = true,
            "confirmed" => facts.confirmed = true,
            "min" | "gte" => bound(&mut facts.minimum, rule.number(0)),
            "max" | "lte" => bound(&mut facts.maximum, rule.number(0)),
            "between" => {
                bound(&mut facts.minimum, rule.number(0));
                bound(&mut facts.maximum, rule.number(1));
            }
            "size" => {
                bound(&mut facts.minimum, rule.number(0));
                bound(&mut facts.maximum, rule.number(0));
            }
            // parameters count digits
            "digits" | "digits_between" => {
                let high = if rule.name == "digits" { rule.number(0) } else { rule.number(1) };
                bound(&mut facts.minimum, rule.number(0).map(token::smallest_with_digits));
                bound(&mut facts.maximum, high.map(token::largest_with_digits));
                if facts.base.is_none() {
                    facts.base = token::base_type(&rule.name);
                }
            }
            "in" => {
                facts.inclusion = Some(rule.params().into_iter().map(|p| Literal::Str(p.to_string())).collect());
            }
            "regex" => facts.pattern = Some(token::strip_delimiters(&rule.raw)),
            name => {
                if facts.base.is_none() {
                    facts.base = token::base_type(name);
                }
            }
        }
    }

    fn object_rule(&self, facts: &mut LeafFacts, key: &str, obj: &RuleObject) -> Result<()> {
        match &obj.class {
            RuleClass::In => match token::object_literals(obj) {
                Some(literals) => facts.inclusion = Some(literals),
                None => self.note(None, format!("`{key}`: inclusion rule without literal values")),
            },
            RuleClass::Enum { name } => match self.catalog.get_enum(name) {
                Ok(e) => facts.enumeration = Some(Type::literal_set(e.backing, e.values)),
                Err(source) if self.config.strict => {
                    return Err(InferError::Catalog { entity: name.clone(), source });
                }
                Err(source) => self.note(Some(name.as_str()), format!("`{key}`: {source}")),
            },
            class => {
                if facts.base.is_none() {
                    facts.base = token::object_base_type(class);
                }
            }
        }
        Ok(())
    }
}

/// Bound parameters naming another field do not parse and leave the slot as is.
fn bound(slot: &mut Option<f64>, value: Option<f64>) {
    if value.is_some() {
        *slot = value;
    }
}

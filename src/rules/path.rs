//! Rule-map keys: dot paths with `*` wildcards, folded into a type tree.
use crate::error::{InferError, Result};
use crate::ty::{ArrTy, Kind, ObjTy, Type};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    /// `*`: every key at this position.
    Wildcard,
}

/// Split on unescaped dots. `\.` is a literal dot inside a segment.
pub fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let mut raw: Vec<(String, bool)> = Vec::new();
    let mut cur = String::new();
    let mut escaped = false;
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                chars.next();
                cur.push('.');
                escaped = true;
            }
            '.' => {
                raw.push((std::mem::take(&mut cur), escaped));
                escaped = false;
            }
            _ => cur.push(c),
        }
    }
    raw.push((cur, escaped));

    let mut out = Vec::with_capacity(raw.len());
    for (i, (seg, escaped)) in raw.into_iter().enumerate() {
        if seg.is_empty() {
            return Err(InferError::EmptySegment { path: path.to_string() });
        }
        if seg == "*" && !escaped {
            if i == 0 {
                return Err(InferError::WildcardRoot { path: path.to_string() });
            }
            out.push(Segment::Wildcard);
        } else {
            out.push(Segment::Field(seg));
        }
    }
    Ok(out)
}

/// Fold `leaf` into `node` along `path`.
///
/// Field segments coerce the node into an object, wildcards into a list.
/// Coercion replaces only the node's kind, so an already recorded
/// `required` flag survives. A leaf landing on a node that already has
/// children keeps them and only contributes its slot metadata.
pub fn insert(node: &mut Type, path: &[Segment], leaf: Type) {
    let Some((seg, rest)) = path.split_first() else {
        settle_leaf(node, leaf);
        return;
    };

    // `T | null` with a container member: descend into the container
    if let Kind::Union { members } = &mut node.kind {
        if let Some(container) = members.iter_mut().find(|m| is_container(m)) {
            insert(container, path, leaf);
            return;
        }
    }

    match seg {
        Segment::Wildcard => {
            let mut item = match std::mem::take(&mut node.kind) {
                Kind::Array(ArrTy { item: Some(item), shape: None, .. }) => *item,
                _ => Type::unknown(),
            };
            insert(&mut item, rest, leaf);
            node.kind = Kind::Array(ArrTy::list(item));
        }
        Segment::Field(name) => {
            let mut obj = match std::mem::take(&mut node.kind) {
                Kind::Object(obj) => obj,
                _ => ObjTy::new(None),
            };
            insert(obj.properties.entry(name.clone()).or_default(), rest, leaf);
            node.kind = Kind::Object(obj);
        }
    }
}

fn settle_leaf(node: &mut Type, leaf: Type) {
    if !has_children(node) {
        *node = leaf;
        return;
    }
    let nullable = leaf.members().iter().any(Type::is_null);
    if nullable && !node.members().iter().any(Type::is_null) {
        *node = std::mem::take(node).nullable();
    }
    node.required = leaf.required;
    if leaf.description.is_some() {
        node.description = leaf.description;
    }
    if !leaf.examples.is_empty() {
        node.examples = leaf.examples;
    }
}

fn is_container(t: &Type) -> bool {
    matches!(t.kind, Kind::Array(_) | Kind::Object(_))
}

fn has_children(t: &Type) -> bool {
    match &t.kind {
        Kind::Object(obj) => !obj.properties.is_empty(),
        Kind::Array(arr) => arr.item.as_deref().is_some_and(|i| !i.is_unknown()),
        Kind::Union { members } => members.iter().any(has_children),
        _ => false,
    }
}

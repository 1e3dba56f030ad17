use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use super::{merge, Type};

/// Array node. `shape` (fixed keys, record-like) and `item`/`key`
/// (homogeneous list or map) are alternatives; at most one side is populated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrTy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Box<Type>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<Type>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<IndexMap<String, Type>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ArrTy {
    pub fn list(item: Type) -> Self {
        Self { item: Some(Box::new(item)), ..Self::default() }
    }

    pub fn keyed(key: Option<Type>, item: Type) -> Self {
        Self {
            item: Some(Box::new(item)),
            key: key.map(Box::new),
            ..Self::default()
        }
    }

    pub fn shaped(shape: IndexMap<String, Type>) -> Self {
        Self { shape: Some(shape), ..Self::default() }
    }

    pub fn item_type(&self) -> Type {
        self.item.as_deref().cloned().unwrap_or_default()
    }

    pub fn key_type(&self) -> Option<Type> {
        self.key.as_deref().cloned()
    }

    /// Key-wise shape join. A key present on only one side can no longer be
    /// required.
    pub(super) fn merge_shapes(
        a: &IndexMap<String, Type>,
        b: &IndexMap<String, Type>,
        max_depth: usize,
    ) -> IndexMap<String, Type> {
        let mut out = IndexMap::new();
        for (k, ta) in a {
            match b.get(k) {
                Some(tb) => { out.insert(k.clone(), merge(ta, tb, max_depth)); }
                None => { out.insert(k.clone(), ta.clone().with_required(false)); }
            }
        }
        for (k, tb) in b {
            if !out.contains_key(k) {
                out.insert(k.clone(), tb.clone().with_required(false));
            }
        }
        out
    }
}

/// Key type for a shape seen as a map: `None` when the keys are exactly the
/// positions `0..n` (a list), integer keys otherwise, string keys as fallback.
pub(super) fn key_type_of<'a>(keys: impl Iterator<Item = &'a String>) -> Option<Type> {
    let keys: Vec<&String> = keys.collect();
    let positional = keys.iter().enumerate().all(|(i, k)| k.parse::<usize>() == Ok(i));
    if positional {
        return None;
    }
    if keys.iter().all(|k| k.parse::<i64>().is_ok()) {
        Some(Type::integer())
    } else {
        Some(Type::string())
    }
}

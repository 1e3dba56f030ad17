use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use super::Type;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjTy {
    #[serde(default)]
    pub properties: IndexMap<String, Type>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ObjTy {
    pub fn new(origin: Option<String>) -> Self {
        Self { properties: IndexMap::new(), origin }
    }

    /// An object with no properties but an origin tag stands for "a row of
    /// that entity", to be expanded through the catalog.
    pub fn entity_ref(&self) -> Option<&str> {
        if self.properties.is_empty() { self.origin.as_deref() } else { None }
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.properties.get(name)
    }
}

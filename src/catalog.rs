//! In-memory entity catalog, decoded from a request document.
//!
//! Column types are either a SQL type string (`varchar(255)`, `bigint`,
//! `tinyint(1)`) or a full `Type` node; objects with an `origin` and no
//! properties refer to another entity's row.
use std::collections::BTreeSet;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::provider::{Column, EntityCatalogProvider, EnumDescriptor, Relation, Visibility};
use crate::ty::{ScalarKind, Type};

// ------------------------------- Policy ---------------------------------- //

/// `name[(params)] [unsigned]`, case-insensitive.
static SQL_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([a-z_ ]+?)\s*(?:\(\s*([^)]*)\))?\s*(?:unsigned)?\s*$")
        .expect("valid sql type regex")
});

/// Map a SQL (or plain scalar) column type to a `Type`. `None` when the name
/// is not recognised.
pub fn sql_type(sql: &str) -> Option<Type> {
    let caps = SQL_TYPE_RE.captures(sql)?;
    let name = caps[1].trim().to_ascii_lowercase();
    let params = caps.get(2).map(|m| m.as_str().trim());
    let ty = match name.as_str() {
        "tinyint" if params == Some("1") => Type::boolean(),
        "int" | "integer" | "tinyint" | "smallint" | "mediumint" | "bigint" | "serial"
        | "bigserial" | "year" => Type::integer(),
        "decimal" | "numeric" | "float" | "double" | "double precision" | "real" | "number" => Type::float(),
        "bool" | "boolean" => Type::boolean(),
        "date" => Type::formatted(ScalarKind::String, "date"),
        "datetime" | "timestamp" | "timestamptz" | "timestamp with time zone" => {
            Type::formatted(ScalarKind::String, "date-time")
        }
        "time" => Type::formatted(ScalarKind::String, "time"),
        "uuid" => Type::formatted(ScalarKind::String, "uuid"),
        "char" | "varchar" | "character varying" | "text" | "tinytext" | "mediumtext"
        | "longtext" | "string" | "enum" | "set" => Type::string(),
        "json" | "jsonb" => Type::unknown(),
        _ => return None,
    };
    Some(ty)
}

// -------------------------------- Model ---------------------------------- //

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnType {
    Sql(String),
    Resolved(Type),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDecl {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDecl>,
    #[serde(default)]
    pub hidden: BTreeSet<String>,
    #[serde(default)]
    pub visible: BTreeSet<String>,
    #[serde(default)]
    pub relations: IndexMap<String, Relation>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub entities: IndexMap<String, EntityDecl>,
    #[serde(default)]
    pub enums: IndexMap<String, EnumDescriptor>,
}

impl StaticCatalog {
    fn entity(&self, name: &str) -> Result<&EntityDecl, CatalogError> {
        self.entities.get(name).ok_or_else(|| CatalogError::UnknownEntity(name.to_string()))
    }
}

impl EntityCatalogProvider for StaticCatalog {
    fn get_columns(&self, entity: &str) -> Result<Vec<Column>, CatalogError> {
        self.entity(entity)?
            .columns
            .iter()
            .map(|c| -> Result<Column, CatalogError> {
                let ty = match &c.ty {
                    ColumnType::Resolved(ty) => ty.clone(),
                    ColumnType::Sql(sql) => sql_type(sql).ok_or_else(|| CatalogError::ColumnType {
                        column: c.name.clone(),
                        sql: sql.clone(),
                    })?,
                };
                Ok(Column { name: c.name.clone(), ty, nullable: c.nullable })
            })
            .collect()
    }

    fn get_visibility(&self, entity: &str) -> Visibility {
        match self.entities.get(entity) {
            Some(e) => Visibility { visible: e.visible.clone(), hidden: e.hidden.clone() },
            None => Visibility::default(),
        }
    }

    fn table_name(&self, entity: &str) -> Option<String> {
        self.entities.get(entity)?.table.clone()
    }

    fn get_relation(&self, entity: &str, name: &str) -> Option<Relation> {
        self.entities.get(entity)?.relations.get(name).cloned()
    }

    fn get_enum(&self, name: &str) -> Result<EnumDescriptor, CatalogError> {
        self.enums.get(name).cloned().ok_or_else(|| CatalogError::UnknownEnum(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::ty::Literal;

    #[test]
    fn sql_types_map_to_scalars() {
        assert_eq!(sql_type("BIGINT UNSIGNED"), Some(Type::integer()));
        assert_eq!(sql_type("tinyint(1)"), Some(Type::boolean()));
        assert_eq!(sql_type("tinyint(4)"), Some(Type::integer()));
        assert_eq!(sql_type("decimal(8,2)"), Some(Type::float()));
        assert_eq!(sql_type("varchar(255)"), Some(Type::string()));
        assert_eq!(sql_type("timestamp"), Some(Type::formatted(ScalarKind::String, "date-time")));
        assert_eq!(sql_type("date"), Some(Type::formatted(ScalarKind::String, "date")));
        assert_eq!(sql_type("json"), Some(Type::unknown()));
        assert_eq!(sql_type("geometry"), None);
    }

    #[test]
    fn decodes_entities_relations_and_enums() {
        let catalog: StaticCatalog = serde_json::from_value(json!({
            "entities": {
                "User": {
                    "table": "users",
                    "columns": [
                        { "name": "id", "type": "bigint" },
                        { "name": "role", "type": { "kind": "scalar", "scalar": "string" }, "nullable": true }
                    ],
                    "hidden": ["password"],
                    "relations": { "posts": { "target": "Post", "many": true } }
                }
            },
            "enums": {
                "Status": { "backing": "integer", "values": [1, 2] }
            }
        })).unwrap();

        let cols = catalog.get_columns("User").unwrap();
        assert_eq!(cols[0].ty, Type::integer());
        assert_eq!(cols[1].ty, Type::string());
        assert!(cols[1].nullable);
        assert_eq!(catalog.table_name("User").as_deref(), Some("users"));
        assert!(!catalog.get_visibility("User").allows("password"));
        assert!(catalog.get_relation("User", "posts").unwrap().many);
        let status = catalog.get_enum("Status").unwrap();
        assert_eq!(status.backing, ScalarKind::Integer);
        assert_eq!(status.values, vec![Literal::Int(1), Literal::Int(2)]);
    }

    #[test]
    fn missing_entities_and_bad_columns_are_errors() {
        let catalog: StaticCatalog = serde_json::from_value(json!({
            "entities": { "Shape": { "columns": [{ "name": "area", "type": "geometry" }] } }
        })).unwrap();
        assert_eq!(catalog.get_columns("Ghost"), Err(CatalogError::UnknownEntity("Ghost".into())));
        assert!(matches!(catalog.get_columns("Shape"), Err(CatalogError::ColumnType { .. })));
        assert!(catalog.get_enum("Nope").is_err());
    }
}

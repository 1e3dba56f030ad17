use thiserror::Error;

/// Failure reading an entity's metadata from the catalog provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    #[error("unknown enumeration `{0}`")]
    UnknownEnum(String),
    #[error("unsupported column type `{sql}` for `{column}`")]
    ColumnType { column: String, sql: String },
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferError {
    /// `*` may only appear after the first segment of a rule path.
    #[error("rule path `{path}` starts with a wildcard segment")]
    WildcardRoot { path: String },

    #[error("rule path `{path}` contains an empty segment")]
    EmptySegment { path: String },

    /// Only raised in strict mode; normal mode degrades to an empty row.
    #[error("catalog for entity `{entity}` could not be read: {source}")]
    Catalog {
        entity: String,
        #[source]
        source: CatalogError,
    },

    /// Only raised in strict mode; normal mode answers "not resolvable".
    #[error("cannot resolve {what}")]
    Unresolvable { what: String },
}

pub type Result<T, E = InferError> = std::result::Result<T, E>;

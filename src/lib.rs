//! Static type inference for query-builder chains, collection pipelines and
//! validation rule maps, lowered to a JSON-Schema-like document.
//!
//! The [`Engine`](engine::Engine) is handed its collaborators (entity
//! catalog, expression typing, callable returns, declared builder methods)
//! and never executes or reflects over application code.
pub mod ty;
pub mod expr;
pub mod walk;
pub mod builder;
pub mod collection;
pub mod rules;
pub mod provider;
pub mod catalog;
pub mod analyzer;
pub mod engine;
pub mod config;
pub mod error;
pub mod lower;
pub mod request;
pub mod path_de;
pub mod jq_exec;

pub use config::Config;
pub use engine::{Diagnostic, Engine};
pub use error::{CatalogError, InferError};
pub use expr::{Expr, Scope};
pub use ty::Type;

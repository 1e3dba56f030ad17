//! Page envelopes wrapped around a row type by the paginating finishers.
use indexmap::IndexMap;
use crate::ty::{ScalarKind, Type, COLLECTION_ORIGIN};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageKind {
    /// `paginate`: totals and a link list.
    LengthAware,
    /// `simplePaginate`: no totals.
    Simple,
    /// `cursorPaginate`: opaque cursors instead of page numbers.
    Cursor,
}

impl PageKind {
    pub fn from_method(name: &str) -> Option<Self> {
        match name {
            "paginate" => Some(PageKind::LengthAware),
            "simplePaginate" => Some(PageKind::Simple),
            "cursorPaginate" => Some(PageKind::Cursor),
            _ => None,
        }
    }

    pub fn origin(&self) -> &'static str {
        match self {
            PageKind::LengthAware => "length_aware_paginator",
            PageKind::Simple => "paginator",
            PageKind::Cursor => "cursor_paginator",
        }
    }
}

fn page_number() -> Type {
    let mut t = Type::integer();
    if let crate::ty::Kind::Scalar(s) = &mut t.kind {
        s.minimum = Some(1.0.into());
    }
    t
}

fn url() -> Type { Type::formatted(ScalarKind::String, "uri") }

fn link() -> Type {
    let mut props = IndexMap::new();
    props.insert("url".to_string(), url().nullable().with_required(true));
    props.insert("label".to_string(), Type::string().with_required(true));
    props.insert("active".to_string(), Type::boolean().with_required(true));
    Type::object(props, None)
}

/// Envelope for `kind` around `Array(itemType: row)`.
pub fn envelope(kind: PageKind, row: Type) -> Type {
    let mut props: IndexMap<String, Type> = IndexMap::new();
    let mut put = |name: &str, ty: Type| { props.insert(name.to_string(), ty.with_required(true)); };

    match kind {
        PageKind::LengthAware => {
            put("current_page", page_number());
            put("data", Type::list(row).with_origin(Some(COLLECTION_ORIGIN.to_string())));
            put("first_page_url", url());
            put("from", Type::integer().nullable());
            put("last_page", page_number());
            put("last_page_url", url());
            put("links", Type::list(link()));
            put("next_page_url", url().nullable());
            put("path", url().nullable());
            put("per_page", Type::integer());
            put("prev_page_url", url().nullable());
            put("to", Type::integer().nullable());
            put("total", Type::integer());
        }
        PageKind::Simple => {
            put("current_page", page_number());
            put("data", Type::list(row).with_origin(Some(COLLECTION_ORIGIN.to_string())));
            put("first_page_url", url());
            put("from", Type::integer().nullable());
            put("next_page_url", url().nullable());
            put("path", url().nullable());
            put("per_page", Type::integer());
            put("prev_page_url", url().nullable());
            put("to", Type::integer().nullable());
        }
        PageKind::Cursor => {
            put("data", Type::list(row).with_origin(Some(COLLECTION_ORIGIN.to_string())));
            put("path", url().nullable());
            put("per_page", Type::integer());
            put("next_cursor", Type::string().nullable());
            put("next_page_url", url().nullable());
            put("prev_cursor", Type::string().nullable());
            put("prev_page_url", url().nullable());
        }
    }
    Type::object(props, Some(kind.origin().to_string()))
}

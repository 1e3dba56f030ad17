//! Column projection tracking for `select` / `addSelect` style steps.
use once_cell::sync::Lazy;
use regex::Regex;
use crate::walk::Argument;

/// `[table.]column [as alias]`, with `*` allowed as the column.
static COLUMN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:([A-Za-z_][\w]*)\.)?(\*|[A-Za-z_][\w]*)(?:\s+as\s+([A-Za-z_][\w]*))?\s*$")
        .expect("valid column regex")
});

/// Raw expressions still expose their alias: `count(*) as total`.
static ALIAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^.*\s+as\s+([A-Za-z_][\w]*)\s*$").expect("valid alias regex")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    /// Catalog column, `*`, or the raw expression when it could not be parsed.
    pub column: String,
    pub alias: Option<String>,
    /// Not a plain column reference; its type is never looked up.
    pub raw: bool,
}

impl ColumnRef {
    pub fn parse(src: &str) -> Self {
        if let Some(caps) = COLUMN_RE.captures(src) {
            return Self {
                table: caps.get(1).map(|m| m.as_str().to_string()),
                column: caps[2].to_string(),
                alias: caps.get(3).map(|m| m.as_str().to_string()),
                raw: false,
            };
        }
        Self {
            table: None,
            column: src.trim().to_string(),
            alias: ALIAS_RE.captures(src).map(|c| c[1].to_string()),
            raw: true,
        }
    }

    pub fn is_wildcard(&self) -> bool { !self.raw && self.column == "*" }

    /// Property name in the produced row.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }

    /// A qualifier is honored only when it names the entity's own table.
    pub fn is_local(&self, own_table: Option<&str>) -> bool {
        match (&self.table, own_table) {
            (None, _) => !self.raw,
            (Some(t), Some(own)) => t == own,
            (Some(_), None) => false,
        }
    }
}

/// One possible set of visible columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    /// Every catalog column, before `columns`.
    pub all: bool,
    pub columns: Vec<ColumnRef>,
}

impl Projection {
    pub fn everything() -> Self { Self { all: true, columns: Vec::new() } }

    fn from_names(names: &[String]) -> Self {
        let columns: Vec<ColumnRef> = names.iter().map(|n| ColumnRef::parse(n)).collect();
        if columns.is_empty() { Self::everything() } else { Self { all: false, columns } }
    }
}

/// Alternatives for a variadic column argument list. Each argument may hold
/// one of several literal sets; the result is every combination. `None` when
/// any argument is not a known string set.
pub fn column_alternatives(args: &[Argument]) -> Option<Vec<Vec<String>>> {
    let mut acc: Vec<Vec<String>> = vec![Vec::new()];
    for arg in args {
        let alts = arg.string_alternatives();
        if alts.is_empty() {
            return None;
        }
        acc = acc.iter()
            .flat_map(|prefix| alts.iter().map(move |alt| {
                let mut x = prefix.clone();
                x.extend(alt.iter().cloned());
                x
            }))
            .collect();
    }
    acc.dedup();
    Some(acc)
}

/// `select(...)`: replace every variant. Unknown arguments widen to all columns.
pub fn apply_select(args: &[Argument]) -> Vec<Projection> {
    match column_alternatives(args) {
        Some(alts) => alts.iter().map(|names| Projection::from_names(names)).collect(),
        None => vec![Projection::everything()],
    }
}

/// `addSelect(...)`: extend every variant with every alternative.
pub fn apply_add_select(variants: &[Projection], args: &[Argument]) -> Vec<Projection> {
    let Some(alts) = column_alternatives(args) else {
        return variants.iter().map(|v| Projection { all: true, ..v.clone() }).collect();
    };
    let mut out = Vec::new();
    for v in variants {
        for names in &alts {
            let mut next = v.clone();
            next.columns.extend(names.iter().map(|n| ColumnRef::parse(n)));
            if !out.contains(&next) { out.push(next); }
        }
    }
    out
}

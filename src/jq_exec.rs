//! jaq pre-filter for request documents.
use anyhow::{anyhow, Context, Result};
use jaq_core::{compile::Undefined, load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

/// Run a jq filter over one input document; every output is a request.
pub fn run_filter(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };
    let modules = loader.load(&arena, program).map_err(load_errors)?;
    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(compile_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    filter
        .run((Ctx::new([], &inputs), Val::from(input.clone())))
        .enumerate()
        .map(|(i, item)| {
            let val = item.map_err(|e| anyhow!("jq output #{i} failed: {e:?}"))?;
            // Val renders as JSON text
            serde_json::from_str::<Value>(&val.to_string())
                .with_context(|| format!("jq output #{i} is not JSON"))
        })
        .collect()
}

fn load_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    joined(errs.iter().map(|(file, err)| format!("cannot parse `{}`: {err:?}", file.code)))
}

fn compile_errors(errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> anyhow::Error {
    joined(errs.iter().flat_map(|(file, list)| {
        list.iter().map(move |(name, undef)| format!("`{name}` is undefined ({undef:?}) in `{}`", file.code))
    }))
}

fn joined(lines: impl Iterator<Item = String>) -> anyhow::Error {
    anyhow!(lines.collect::<Vec<_>>().join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_selects_request_documents() {
        let doc = json!({ "requests": [{ "expr": { "kind": "opaque" } }, { "expr": { "kind": "opaque" } }] });
        let out = run_filter(".requests[]", &doc).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({ "expr": { "kind": "opaque" } }));
    }

    #[test]
    fn filters_can_reshape_documents() {
        let doc = json!({ "form": { "name": "required" } });
        let out = run_filter("{ rules: .form }", &doc).unwrap();
        assert_eq!(out, [json!({ "rules": { "name": "required" } })]);
    }

    #[test]
    fn bad_filters_are_errors() {
        assert!(run_filter(".[", &json!({})).is_err());
        assert!(run_filter("nosuchfn", &json!({})).is_err());
    }
}

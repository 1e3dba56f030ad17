//! Runs every `fixtures/*.json` through the engine and diffs the lowered
//! schema against the fixture's `expected` document.
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;

use schema_infer::request::{ChainRequest, RulesRequest};

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum Fixture {
    Chain { request: ChainRequest, expected: Value },
    Rules { request: RulesRequest, expected: Value },
}

impl Fixture {
    fn check(&self) -> Result<Option<Value>> {
        let (actual, expected) = match self {
            Fixture::Chain { request, expected } => (request.run()?.schema, expected),
            Fixture::Rules { request, expected } => (request.run()?.schema, expected),
        };
        Ok((&actual != expected).then_some(actual))
    }
}

fn load(path: &Path) -> Result<Fixture> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize(de)
        .with_context(|| format!("invalid fixture {}", path.display()))
}

fn main() -> Result<()> {
    let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/*.json");
    let mut failures = 0usize;
    let mut total = 0usize;
    for entry in glob::glob(pattern)? {
        let path = entry?;
        total += 1;
        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        match load(&path).and_then(|fixture| fixture.check()) {
            Ok(None) => println!("{} {name}", "ok".green()),
            Ok(Some(actual)) => {
                failures += 1;
                println!("{} {name}", "FAIL".red().bold());
                println!("{}", serde_json::to_string_pretty(&actual)?);
            }
            Err(error) => {
                failures += 1;
                println!("{} {name}: {error:#}", "ERROR".red().bold());
            }
        }
    }
    println!("{} of {total} fixtures passed", total - failures);
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

//! CLI: request documents → (chain | rules) → lowered schema
use std::path::PathBuf;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, Args};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use schema_infer::config::Config;
use schema_infer::engine::Diagnostic;
use schema_infer::request::{ChainRequest, Outcome, RulesRequest};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer output schemas for builder/collection chains and validation rule maps
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// type a builder or collection chain (`expr` + `scope` documents)
    Chain(Target),
    /// type a validation rule map (`rules` documents)
    Rules(Target),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JQ pre-process filter for each document; every output is one request.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

/// Flags win over each document's own `config`.
#[derive(Args, Debug, Clone)]
struct EngineSettings {
    /// turn unresolvable chains and catalog failures into errors
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// recursion budget for type and entity resolution
    #[arg(long)]
    max_depth: Option<usize>,

    /// abort builder chains with steps unknown to both builder contracts
    #[arg(long, default_value_t = false)]
    verify_methods: bool,

    /// print what the engine degraded on
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

#[derive(clap::Parser, Debug)]
struct Target {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    engine_settings: EngineSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(&str, Value) -> Result<()>) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            let json_value = serde_json::from_str::<Value>(&source)
                .with_context(|| format!("failed to parse JSON source file {source_path_str}"))?;
            match self.jq_expr.as_ref() {
                None => apply(&source_path_str, json_value)?,
                Some(jq_expr) => {
                    let outputs = schema_infer::jq_exec::run_filter(jq_expr, &json_value).with_context(|| {
                        format!("failed to apply jq expression to source file {source_path_str}")
                    })?;
                    for json_value in outputs {
                        apply(&source_path_str, json_value)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl EngineSettings {
    fn apply(&self, config: &mut Config) {
        config.strict |= self.strict;
        config.verify_builder_methods |= self.verify_methods;
        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
    }

    fn report(&self, source: &str, diagnostics: &[Diagnostic]) {
        if !self.verbose {
            return;
        }
        for d in diagnostics {
            eprintln!("{} {}: {d}", "warning:".yellow().bold(), source.dimmed());
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        let (target, schemas) = match &self.cmd {
            Command::Chain(target) => (target, target.collect::<ChainRequest>(|req, settings| {
                settings.apply(&mut req.config);
                Ok(req.run()?)
            })?),
            Command::Rules(target) => (target, target.collect::<RulesRequest>(|req, settings| {
                settings.apply(&mut req.config);
                Ok(req.run()?)
            })?),
        };
        let schema = match <[Value; 1]>::try_from(schemas) {
            Ok([one]) => one,
            Err(many) => Value::Array(many),
        };
        let schema_src = serde_json::to_string_pretty(&schema)?;
        match target.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(out, &schema_src)
                    .with_context(|| format!("failed to write {}", out.display()))?;
            }
            None => println!("{schema_src}"),
        }
        Ok(())
    }
}

impl Target {
    /// Decode every input document as `R`, run it, and collect the schemas.
    fn collect<R: DeserializeOwned>(
        &self,
        mut run: impl FnMut(&mut R, &EngineSettings) -> Result<Outcome>,
    ) -> Result<Vec<Value>> {
        let mut schemas = Vec::new();
        self.input_settings.load_process(|source, value| {
            let mut req: R = schema_infer::path_de::from_value_with_path(value)
                .with_context(|| format!("invalid request document {source}"))?;
            let outcome = run(&mut req, &self.engine_settings)
                .with_context(|| format!("inference failed for {source}"))?;
            self.engine_settings.report(source, &outcome.diagnostics);
            schemas.push(outcome.schema);
            Ok(())
        })?;
        Ok(schemas)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Expand literal paths and quoted glob patterns, in argument order. A glob
/// that matches nothing is an error; a literal path is checked when read.
fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !pattern.contains(['*', '?', '[', '{']) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let matched = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern {pattern}"))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if matched.is_empty() {
            return Err(anyhow!("glob pattern matched no files: {pattern}"));
        }
        out.extend(matched);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_document_config() {
        let settings = EngineSettings { strict: true, max_depth: Some(4), verify_methods: false, verbose: false };
        let mut config = Config { verify_builder_methods: true, ..Config::default() };
        settings.apply(&mut config);
        assert!(config.strict);
        assert!(config.verify_builder_methods);
        assert_eq!(config.max_depth, 4);
    }

    #[test]
    fn parses_subcommands() {
        let cli = CommandLineInterface::try_parse_from([
            "schema-infer", "rules", "-i", "a.json", "b/*.json", "--strict", "--max-depth", "8",
        ]).unwrap();
        let Command::Rules(target) = cli.cmd else { panic!("expected rules") };
        assert_eq!(target.input_settings.input, ["a.json", "b/*.json"]);
        assert!(target.engine_settings.strict);
        assert_eq!(target.engine_settings.max_depth, Some(8));
    }

    #[test]
    fn missing_glob_matches_are_errors() {
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
        assert_eq!(resolve_file_path_patterns(["x.json"]).unwrap(), [PathBuf::from("x.json")]);
    }
}

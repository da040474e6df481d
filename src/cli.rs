//! Minimal CLI: load JSON documents → (check | narrow | infer | schema)
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use crate::check::{check, Verdict};
use crate::descriptor::TypeDescriptor;
use crate::inference::Inference;
use crate::narrow::{narrow, uncovered_members, GuardRule};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// check JSON documents against TypeScript-style types, narrow unions with guards, or infer a type
#[derive(Parser, Debug)]
#[command(name = "json-narrow", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// debugging: print the parsed command line and exit
    #[arg(long, global = true)]
    no_op: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// report whether each document is assignable to a type
    Check(CheckOut),
    /// select a guard branch for each document of a union type
    Narrow(NarrowOut),
    /// infer the narrowest type accepting every document
    Infer(InferOut),
    /// print the JSON-schema view of a type
    Schema(SchemaOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct TypeSettings {
    /// type expression, e.g. 'string | { name: string } & { company: string }'
    #[arg(long)]
    ty: Option<TypeDescriptor>,

    /// JSON descriptor file, e.g. {"union": ["string", "number"]}
    #[arg(long)]
    ty_file: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct NarrowOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// guard rules in priority order: 'typeof string => A' or '"maullar" in => Cat'
    #[arg(long = "guard", short = 'g', num_args = 1.., required = true)]
    guards: Vec<GuardRule>,

    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct InferOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// print the descriptor in JSON form instead of a type expression
    #[arg(long)]
    json: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One JSON document after pointer/jq preprocessing, labelled with where it came from.
#[derive(Debug, Clone)]
struct Document {
    source: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSettings {
    fn load(&self) -> Result<TypeDescriptor> {
        match (&self.ty, &self.ty_file) {
            (Some(ty), _) => Ok(ty.clone()),
            (None, Some(path)) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read descriptor file {}", path.display()))?;
                crate::path_de::from_str_with_path(&source)
                    .with_context(|| format!("invalid descriptor file {}", path.display()))
            }
            (None, None) => bail!("either --ty or --ty-file is required"),
        }
    }
}

impl InputSettings {
    fn load(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        self.load_process(|doc| docs.push(doc))?;
        debug!(documents = docs.len(), "loaded input");
        Ok(docs)
    }

    fn load_process(&self, mut apply: impl FnMut(Document)) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let (label, source) = read_source(&source_path)?;
            for (label, json_value) in self.split_documents(&label, &source)? {
                let json_value = match self.json_pointer.as_deref() {
                    None => json_value,
                    Some(ptr) => json_value
                        .pointer(ptr)
                        .cloned()
                        .ok_or_else(|| anyhow!("JSON pointer {ptr} matched nothing in {label}"))?,
                };
                match self.jq_expr.as_ref() {
                    None => apply(Document { source: label, value: json_value }),
                    Some(jq_expr) => {
                        let results = crate::jq_exec::run_jaq(jq_expr, &json_value)
                            .with_context(|| format!("failed to apply jq expression to {label}"))?;
                        let many = results.len() > 1;
                        for (ix, value) in results.into_iter().enumerate() {
                            let source = if many { format!("{label}#{ix}") } else { label.clone() };
                            apply(Document { source, value })
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn split_documents(&self, label: &str, source: &str) -> Result<Vec<(String, Value)>> {
        if !self.ndjson {
            let value = serde_json::from_str::<Value>(source)
                .with_context(|| format!("failed to parse JSON source file ({label})"))?;
            return Ok(vec![(label.to_string(), value)]);
        }
        let mut out = Vec::new();
        for (ix, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_label = format!("{label}:{}", ix + 1);
            let value = serde_json::from_str::<Value>(line)
                .with_context(|| format!("failed to parse NDJSON line ({line_label})"))?;
            out.push((line_label, value));
        }
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        if self.no_op {
            eprintln!("{self:#?}");
            return Ok(ExitCode::SUCCESS);
        }
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Narrow(target) => target.run(),
            Command::Infer(target) => target.run(),
            Command::Schema(target) => target.run(),
        }
    }
}

impl CheckOut {
    fn run(&self) -> Result<ExitCode> {
        let ty = self.type_settings.load()?;
        let docs = self.input_settings.load()?;

        let verdicts: Vec<Verdict<'_>> = docs.par_iter().map(|doc| check(&doc.value, &ty)).collect();

        let mut failed = 0usize;
        for (doc, verdict) in docs.iter().zip(&verdicts) {
            if verdict.assignable {
                match verdict.matched {
                    Some(member) => println!("{} {}: assignable via `{member}`", "ok".green().bold(), doc.source),
                    None => println!("{} {}: assignable", "ok".green().bold(), doc.source),
                }
            } else {
                failed += 1;
                println!("{} {}: not assignable to `{ty}`", "FAIL".red().bold(), doc.source);
            }
            for diagnostic in &verdict.diagnostics {
                println!("  {} {diagnostic}", diagnostic.error_name().yellow());
            }
        }
        info!(documents = docs.len(), failed, "check finished");
        Ok(exit_code(failed))
    }
}

impl NarrowOut {
    fn run(&self) -> Result<ExitCode> {
        let ty = self.type_settings.load()?;
        let union = ty
            .as_union()
            .ok_or_else(|| anyhow!("narrow needs a union type, got `{ty}`"))?;
        for member in uncovered_members(union, &self.guards) {
            eprintln!("{} no guard can select `{member}`", "warning:".yellow().bold());
        }
        let docs = self.input_settings.load()?;

        let outcomes: Vec<_> = docs
            .par_iter()
            .map(|doc| narrow(&doc.value, union, &self.guards))
            .collect();

        let mut failed = 0usize;
        for (doc, outcome) in docs.iter().zip(outcomes) {
            match outcome {
                Ok(branch) => println!("{} {}: {branch}", "ok".green().bold(), doc.source),
                Err(error) => {
                    failed += 1;
                    println!("{} {}: {error}", "FAIL".red().bold(), doc.source);
                }
            }
        }
        info!(documents = docs.len(), failed, "narrow finished");
        Ok(exit_code(failed))
    }
}

impl InferOut {
    fn run(&self) -> Result<ExitCode> {
        let mut inf = Inference::new();
        self.input_settings.load_process(|doc| inf.observe_value(&doc.value))?;
        let ty = inf.solve().context("cannot infer a type from the input")?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&ty)?);
        } else {
            println!("{ty}");
        }
        Ok(ExitCode::SUCCESS)
    }
}

impl SchemaOut {
    fn run(&self) -> Result<ExitCode> {
        let ty = self.type_settings.load()?;
        for conflict in crate::check::intersection_conflicts(&ty) {
            eprintln!("{} {conflict}", "warning:".yellow().bold());
        }
        let schema = crate::schema::schema_for(&ty);
        let schema_src = serde_json::to_string_pretty(&schema)?;
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, &schema_src)
                .with_context(|| format!("failed to write {}", out.display()))?;
        } else {
            println!("{schema_src}");
        }
        Ok(ExitCode::SUCCESS)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

const STDIN: &str = "-";

fn read_source(path: &PathBuf) -> Result<(String, String)> {
    if path.as_os_str() == STDIN {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("failed to read stdin")?;
        return Ok(("<stdin>".to_string(), source));
    }
    let label = path.to_string_lossy().to_string();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source file {label}"))?;
    Ok((label, source))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            if pattern == STDIN && out.iter().any(|p| p.as_os_str() == STDIN) {
                bail!("stdin (`{STDIN}`) can only be given once as an input");
            }
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

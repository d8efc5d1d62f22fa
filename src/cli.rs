//! CLI: compatible | generate | match | stub
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::compatibility::{DEFAULT_THREADS, backward_compatible_files, check_compatibility};
use crate::document::load_feature;
use crate::feature::Feature;
use crate::pattern::Pattern;
use crate::stub::StubRecord;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// contract-driven API checks: backward compatibility, example generation and payload matching
#[derive(Parser, Debug)]
#[command(version)]
pub struct CommandLineInterface {
    /// debug logging on stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// check that the newer contract is backward compatible with the older one
    Compatible(CompatibleCmd),
    /// print a generated stub record for each scenario
    Generate(GenerateCmd),
    /// match JSON documents against a named type of a contract
    Match(MatchCmd),
    /// check stub records against the scenarios of a contract
    Stub(StubCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CompatibleCmd {
    /// the contract clients were built against
    older: PathBuf,

    /// the contract being introduced
    newer: PathBuf,

    /// worker threads comparing scenarios
    #[arg(long, env = "SHAPE_COMPAT_THREADS", default_value_t = DEFAULT_THREADS, value_parser = parse_threads)]
    threads: usize,
}

#[derive(clap::Parser, Debug)]
struct GenerateCmd {
    contract: PathBuf,

    /// only this scenario
    #[arg(long)]
    scenario: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct MatchCmd {
    #[arg(long)]
    contract: PathBuf,

    /// name of a type declared in the contract
    #[arg(long = "type")]
    type_name: String,

    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct StubCmd {
    contract: PathBuf,

    #[command(flatten)]
    input_settings: InputSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(&Path, serde_json::Value) -> Result<()>) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {}", source_path.display()))?;
            let documents = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(index, line)| {
                        serde_json::from_str::<serde_json::Value>(line).with_context(|| {
                            format!("failed to parse line {} of {}", index + 1, source_path.display())
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            } else {
                let document = serde_json::from_str::<serde_json::Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({})", source_path.display()))?;
                vec![document]
            };
            for document in documents {
                let selected = match self.json_pointer.as_deref() {
                    None => document,
                    Some(pointer) => document.pointer(pointer).cloned().with_context(|| {
                        format!("json pointer {pointer} selects nothing in {}", source_path.display())
                    })?,
                };
                apply(&source_path, selected)?;
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Run the selected command; the returned value is the process exit code.
    pub fn run(&self) -> Result<i32> {
        match &self.cmd {
            Command::Compatible(target) => {
                let output = check_compatibility(|| backward_compatible_files(&target.older, &target.newer, target.threads));
                if output.exit_code == 0 {
                    println!("{}", output.message.green());
                } else {
                    println!("{}", output.message.red());
                }
                Ok(output.exit_code)
            }
            Command::Generate(target) => {
                let feature = load_contract(&target.contract)?;
                let mut stubs = feature.generate_stubs()?;
                if let Some(name) = target.scenario.as_deref() {
                    stubs.retain(|scenario, _| scenario == name);
                    if stubs.is_empty() {
                        bail!("no active scenario named \"{name}\" in {}", target.contract.display());
                    }
                }
                let records = stubs.values().map(StubRecord::to_json).collect::<Result<Vec<_>, _>>()?;
                let records = if records.len() == 1 {
                    records.into_iter().next().unwrap_or_default()
                } else {
                    serde_json::Value::Array(records)
                };
                let records_src = serde_json::to_string_pretty(&records)?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &records_src)?;
                } else {
                    println!("{records_src}");
                }
                Ok(0)
            }
            Command::Match(target) => {
                let feature = load_contract(&target.contract)?;
                if !feature.resolver.contains(&target.type_name) {
                    bail!("type {} is not declared in {}", target.type_name, target.contract.display());
                }
                let pattern = Pattern::deferred(&target.type_name);
                let mut failed = 0usize;
                target.input_settings.load_process(|source_path, document| {
                    let result = pattern.matches(&Value::from_json(&document), &feature.resolver);
                    match result.as_failure() {
                        None => println!("{} {}", "✓".green(), source_path.display()),
                        Some(failure) => {
                            failed += 1;
                            println!("{} {}\n{}", "✗".red(), source_path.display(), failure.report());
                        }
                    }
                    Ok(())
                })?;
                Ok(if failed == 0 { 0 } else { 1 })
            }
            Command::Stub(target) => {
                let feature = load_contract(&target.contract)?;
                let mut failed = 0usize;
                target.input_settings.load_process(|source_path, document| {
                    if !check_stub(&feature, source_path, &document) {
                        failed += 1;
                    }
                    Ok(())
                })?;
                Ok(if failed == 0 { 0 } else { 1 })
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_contract(path: &Path) -> Result<Feature> {
    load_feature(path).with_context(|| format!("failed to load contract {}", path.display()))
}

/// Print the verdict for one stub record; `false` when it does not fit.
fn check_stub(feature: &Feature, source_path: &Path, document: &serde_json::Value) -> bool {
    let record = match StubRecord::from_json(document) {
        Ok(record) => record,
        Err(error) => {
            println!("{} {}: {error}", "✗".red(), source_path.display());
            return false;
        }
    };
    match &record {
        StubRecord::Kafka(message) => {
            println!("{} {}: kafka message on {} not checked", "-".dimmed(), source_path.display(), message.topic);
            true
        }
        StubRecord::Http { request, response, .. } => match feature.match_stub(request, response) {
            Ok(scenario) => {
                println!("{} {}: matches \"{}\"", "✓".green(), source_path.display(), scenario.name);
                true
            }
            Err(failures) => {
                println!("{} {}: no scenario accepts this stub", "✗".red(), source_path.display());
                for failure in failures.iter().filter_map(|result| result.as_failure()) {
                    println!("\n{}", failure.report());
                }
                false
            }
        },
    }
}

fn parse_threads(text: &str) -> Result<usize, String> {
    match text.trim().parse::<usize>() {
        Ok(0) => Err("at least one thread is required".into()),
        Ok(threads) => Ok(threads),
        Err(error) => Err(error.to_string()),
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
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
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn contract(dir: &Path, name: &str, body: serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        let document = json!({
            "types": {"Person": {"name": "(string)", "age?": "(number)"}},
            "scenarios": [{
                "name": "add person",
                "request": {"method": "POST", "path": "/people", "body": body},
                "response": {"status": 201}
            }]
        });
        fs::write(&path, document.to_string()).unwrap();
        path
    }

    fn cli(args: &[&str]) -> CommandLineInterface {
        CommandLineInterface::try_parse_from(std::iter::once("shape-compat").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn zero_threads_are_rejected() {
        assert!(CommandLineInterface::try_parse_from(["shape-compat", "compatible", "a", "b", "--threads", "0"]).is_err());
        let parsed = cli(&["compatible", "a", "b", "--threads", "4"]);
        let Command::Compatible(target) = parsed.cmd else { panic!("expected compatible") };
        assert_eq!(target.threads, 4);
    }

    #[test]
    fn compatible_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let older = contract(dir.path(), "older.json", json!("(Person)"));
        let newer = contract(dir.path(), "newer.json", json!({"name": "(string)"}));
        let path = |p: &PathBuf| p.to_string_lossy().to_string();

        assert_eq!(cli(&["compatible", &path(&older), &path(&older)]).run().unwrap(), 0);
        // keys the newer request drops are ignored
        assert_eq!(cli(&["compatible", &path(&older), &path(&newer)]).run().unwrap(), 0);
        assert_eq!(cli(&["compatible", &path(&newer), &path(&older)]).run().unwrap(), 0);
        let missing = dir.path().join("missing.json");
        assert_eq!(cli(&["compatible", &path(&missing), &path(&older)]).run().unwrap(), 1);
    }

    #[test]
    fn match_reports_failures_through_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let contract = contract(dir.path(), "contract.json", json!("(Person)"));
        let good = dir.path().join("good.json");
        fs::write(&good, json!({"person": {"name": "Jane"}}).to_string()).unwrap();
        let bad = dir.path().join("bad.ndjson");
        fs::write(&bad, "{\"name\": \"Jane\"}\n\n{\"name\": 1}\n").unwrap();

        let contract = contract.to_string_lossy().to_string();
        let good = good.to_string_lossy().to_string();
        let bad = bad.to_string_lossy().to_string();
        let ok = cli(&["match", "--contract", &contract, "--type", "Person", "--json-pointer", "/person", "--input", &good]);
        assert_eq!(ok.run().unwrap(), 0);
        let failing = cli(&["match", "--contract", &contract, "--type", "Person", "--ndjson", "--input", &bad]);
        assert_eq!(failing.run().unwrap(), 1);
        let unknown = cli(&["match", "--contract", &contract, "--type", "Robot", "--input", &good]);
        assert!(unknown.run().is_err());
    }

    #[test]
    fn globs_must_match_something() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        let found = resolve_file_path_patterns([format!("{}/*.json", dir.path().display())]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(resolve_file_path_patterns([format!("{}/*.yaml", dir.path().display())]).is_err());
    }
}

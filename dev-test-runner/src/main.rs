//! End-to-end scenario table for json-narrow.
//!
//! Each entry in `scenarios.json` goes through the public library API; the
//! process exits non-zero if any scenario disagrees with its expectation.
use std::process::ExitCode;

use json_narrow::{check, narrow, parse_guard, parse_type, GuardRule, TypeError};
use serde::Deserialize;
use serde_json::Value;

const SCENARIOS: &str = include_str!("../scenarios.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    #[serde(flatten)]
    case: Case,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Case {
    Check {
        ty: String,
        value: Value,
        assignable: bool,
        #[serde(default)]
        diagnostics: Vec<String>,
    },
    Narrow {
        ty: String,
        guards: Vec<String>,
        value: Value,
        #[serde(default)]
        branch: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    Parse {
        ty: String,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        rendered: Option<String>,
    },
}

fn run(case: &Case) -> Result<(), String> {
    match case {
        Case::Check { ty, value, assignable, diagnostics } => {
            let ty = parse_type(ty).map_err(|e| e.to_string())?;
            let verdict = check(value, &ty);
            let names: Vec<&str> = verdict.diagnostics.iter().map(TypeError::error_name).collect();
            if verdict.assignable != *assignable {
                return Err(format!("expected assignable={assignable}, got {}", verdict.assignable));
            }
            if names != *diagnostics {
                return Err(format!("expected diagnostics {diagnostics:?}, got {names:?}"));
            }
            Ok(())
        }
        Case::Narrow { ty, guards, value, branch, error } => {
            let ty = parse_type(ty).map_err(|e| e.to_string())?;
            let union = ty.as_union().ok_or_else(|| format!("`{ty}` is not a union"))?;
            let rules = guards
                .iter()
                .map(|g| parse_guard(g))
                .collect::<Result<Vec<GuardRule>, _>>()
                .map_err(|e| e.to_string())?;
            match (narrow(value, union, &rules), branch, error) {
                (Ok(got), Some(want), _) if got == want => Ok(()),
                (Err(e), _, Some(want)) if e.error_name() == want => Ok(()),
                (got, _, _) => Err(format!("expected branch {branch:?} / error {error:?}, got {got:?}")),
            }
        }
        Case::Parse { ty, error, rendered } => match (parse_type(ty), error, rendered) {
            (Err(e), Some(want), _) if e.error_name() == want => Ok(()),
            (Ok(t), None, Some(want)) if t.to_string() == *want => Ok(()),
            (Ok(_), None, None) => Ok(()),
            (got, _, _) => Err(format!("expected error {error:?} / rendering {rendered:?}, got {got:?}")),
        },
    }
}

fn main() -> ExitCode {
    let de = &mut serde_json::Deserializer::from_str(SCENARIOS);
    let scenarios: Vec<Scenario> = match serde_path_to_error::deserialize(de) {
        Ok(x) => x,
        Err(error) => {
            eprintln!("❌ scenarios.json at {}: {}", error.path(), error.inner());
            return ExitCode::FAILURE;
        }
    };

    let mut failed = 0;
    for scenario in &scenarios {
        match run(&scenario.case) {
            Ok(()) => eprintln!("✅ {}", scenario.name),
            Err(why) => {
                failed += 1;
                eprintln!("❌ {}: {why}", scenario.name);
            }
        }
    }
    eprintln!("—— {} passed, {failed} failed ——", scenarios.len() - failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

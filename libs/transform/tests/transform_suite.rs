//! Data-driven transform suite
//!
//! Uses libtest-mimic to generate one test per case in `tests/cases/*.yaml`.
//! Each case processes a template against a context and compares either the
//! result or the error message.
//!
//! ```bash
//! # Run all cases
//! cargo test -p tessera-transform --test transform_suite
//!
//! # Filter by name
//! cargo test -p tessera-transform --test transform_suite -- for_each
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use libtest_mimic::{Arguments, Failed, Trial};
use serde::Deserialize;
use serde_json::Value;
use tessera_transform::{MapContext, MemoryLoader, Template, TransformEngine};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestCase {
    name: String,
    template: Value,
    #[serde(default)]
    context: Value,
    #[serde(default)]
    resources: BTreeMap<String, String>,
    /// Expected result; absent when the case expects an error
    #[serde(default)]
    expected: Option<Value>,
    /// Substring of the expected error message
    #[serde(default)]
    error: Option<String>,
}

fn cases_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

fn load_cases() -> Result<Vec<(String, TestCase)>, String> {
    let mut files: Vec<PathBuf> = fs::read_dir(cases_dir())
        .map_err(|e| format!("cannot read cases directory: {e}"))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    files.sort();

    let mut cases = Vec::new();
    for file in files {
        let group = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = fs::read_to_string(&file).map_err(|e| format!("{}: {e}", file.display()))?;
        let parsed: Vec<TestCase> =
            serde_yaml::from_str(&text).map_err(|e| format!("{}: {e}", file.display()))?;
        cases.extend(parsed.into_iter().map(|case| (group.clone(), case)));
    }
    Ok(cases)
}

fn make_trial(group: &str, case: TestCase) -> Trial {
    let test_name = format!("{}::{}", group, case.name);
    Trial::test(test_name, move || run_case(&case))
}

fn run_case(case: &TestCase) -> Result<(), Failed> {
    let loader = case
        .resources
        .iter()
        .fold(MemoryLoader::new(), |loader, (id, text)| loader.with(id, text));
    let engine = TransformEngine::builder()
        .loader(loader)
        .build()
        .map_err(|e| Failed::from(format!("engine: {e}")))?;

    let outcome = Template::from_value(&case.template).and_then(|template| {
        let mut context = MapContext::from_value(case.context.clone())?;
        engine.process(&template, &mut context)
    });

    match (outcome, &case.expected, &case.error) {
        (Ok(actual), Some(expected), None) => {
            if &actual == expected {
                Ok(())
            } else {
                Err(format!(
                    "result mismatch\n  expected: {}\n  actual:   {}",
                    expected, actual
                )
                .into())
            }
        }
        (Err(err), None, Some(fragment)) => {
            let message = err.to_string();
            if message.contains(fragment.as_str()) {
                Ok(())
            } else {
                Err(format!("expected error containing '{fragment}', got: {message}").into())
            }
        }
        (Ok(actual), None, Some(fragment)) => {
            Err(format!("expected error containing '{fragment}', got result {actual}").into())
        }
        (Err(err), Some(_), None) => Err(format!("unexpected error: {err}").into()),
        _ => Err("case must declare exactly one of `expected` or `error`".into()),
    }
}

fn main() {
    let args = Arguments::from_args();

    let cases = match load_cases() {
        Ok(cases) => cases,
        Err(message) => {
            eprintln!("failed to load transform cases: {message}");
            std::process::exit(1);
        }
    };
    eprintln!("Transform suite: {} cases", cases.len());

    let trials: Vec<Trial> = cases
        .into_iter()
        .map(|(group, case)| make_trial(&group, case))
        .collect();

    libtest_mimic::run(&args, trials).exit();
}

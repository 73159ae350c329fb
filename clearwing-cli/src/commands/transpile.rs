use std::path::{Path, PathBuf};

use anyhow::Context;
use clearwing::{DiagnosticSeverity, TranspileResult, Transpiler};
use serde::Serialize;

use crate::{
    app::{ConfigOptions, GlobalOptions},
    commands::common::{as_paths, load_config, load_source},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct DiagnosticEntry {
    severity: String,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct TranspileOutput {
    output: String,
    parsed_classes: usize,
    required_classes: usize,
    removed_methods: usize,
    generated_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_class: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    diagnostics: Vec<DiagnosticEntry>,
}

impl TranspileOutput {
    fn new(output: &Path, result: &TranspileResult) -> Self {
        Self {
            output: output.display().to_string(),
            parsed_classes: result.parsed_classes,
            required_classes: result.required_classes,
            removed_methods: result.removed_methods,
            generated_files: result.generated_files.len(),
            main_class: result.main_class.clone(),
            missing_dependencies: result.missing_dependencies.clone(),
            failures: result.failures.clone(),
            diagnostics: result
                .diagnostics
                .iter()
                .filter(|diagnostic| diagnostic.severity != DiagnosticSeverity::Info)
                .map(|diagnostic| DiagnosticEntry {
                    severity: diagnostic.severity.to_string(),
                    category: diagnostic.category.to_string(),
                    class: diagnostic.class.clone(),
                    message: diagnostic.message.clone(),
                })
                .collect(),
        }
    }
}

pub fn run(
    inputs: &[PathBuf],
    sources: &[PathBuf],
    output: &Path,
    options: &ConfigOptions,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let config = load_config(options)?;
    let source = load_source(inputs)?;
    let result = Transpiler::new(config)
        .run_source(&source, &as_paths(sources), output)
        .with_context(|| format!("failed to transpile into {}", output.display()))?;

    let summary = TranspileOutput::new(output, &result);
    print_output(&summary, opts, |out| {
        let mut tw = TabWriter::new(&[("Summary", Align::Left), ("", Align::Right)]);
        tw.row(vec!["Parsed classes".to_string(), out.parsed_classes.to_string()]);
        tw.row(vec!["Required classes".to_string(), out.required_classes.to_string()]);
        tw.row(vec!["Removed methods".to_string(), out.removed_methods.to_string()]);
        tw.row(vec!["Generated files".to_string(), out.generated_files.to_string()]);
        tw.row(vec![
            "Entry point".to_string(),
            out.main_class.clone().unwrap_or_else(|| "-".to_string()),
        ]);
        tw.print();

        if !out.diagnostics.is_empty() {
            println!();
            let mut tw = TabWriter::new(&[
                ("Severity", Align::Left),
                ("Category", Align::Left),
                ("Message", Align::Left),
            ]);
            for diagnostic in &out.diagnostics {
                tw.row(vec![
                    diagnostic.severity.clone(),
                    diagnostic.category.clone(),
                    diagnostic.message.clone(),
                ]);
            }
            tw.print();
        }

        println!("\nOutput written to {}", out.output);
    })?;

    if result.has_failures() {
        anyhow::bail!("{} class(es) failed to generate", result.failure_count());
    }
    Ok(())
}

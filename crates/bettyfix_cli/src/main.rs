//! Bettyfix CLI
//!
//! Command line front end for the betty C style checker.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bettyfix_core::{
    Config, DEFAULT_MAX_PASSES, Diagnostic, Document, DocumentDiagnostics, FixConvergence,
    Severity, fix_file, fix_until_clean,
};
use bettyfix_runner::{BettyRunner, RunnerError};

/// Bettyfix - betty C style checker with automatic fixes
#[derive(Parser)]
#[command(name = "bfix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files with betty
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply recognized fixes to files
    Fix {
        /// Files to fix
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Preview fixes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Maximum fix passes per file
        #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
        max_passes: usize,
    },

    /// Start the LSP server
    Lsp,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(has_findings) => {
            if has_findings {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match &cli.command {
        Commands::Check { files, format } => run_check(&cli, files, format),
        Commands::Fix {
            files,
            dry_run,
            max_passes,
        } => run_fix(files, *dry_run, *max_passes),
        Commands::Lsp => run_lsp().map(|_| false),
    }
}

fn run_lsp() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?
        .block_on(async {
            bettyfix_lsp::run().await;
        });
    Ok(())
}

/// One checked file with its collected diagnostics.
struct CheckResult {
    path: PathBuf,
    set: DocumentDiagnostics,
}

fn run_check(cli: &Cli, files: &[PathBuf], format: &str) -> Result<bool> {
    let config = load_config(cli.config.as_deref())?;
    let runner = BettyRunner::new(config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    let mut results: Vec<CheckResult> = Vec::new();
    let mut failures: Vec<(PathBuf, String)> = Vec::new();

    for path in files {
        // The document text is needed to turn betty's line numbers into
        // spans, so an unreadable file is a failure before betty runs.
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                failures.push((path.clone(), e.to_string()));
                continue;
            }
        };

        let output = match runtime.block_on(runner.run(path)) {
            Ok(output) => output,
            Err(RunnerError::ToolMissing) => {
                return Err(miette::miette!(
                    "betty executable not found ({}); install betty or set betty_path in .bettyfix.jsonc",
                    runner.config().betty_path
                ));
            }
            Err(e) => {
                failures.push((path.clone(), e.to_string()));
                continue;
            }
        };

        let document = Document::new(&text);
        let set = DocumentDiagnostics::from_output(&output, &document);
        results.push(CheckResult {
            path: path.clone(),
            set,
        });
    }

    if !failures.is_empty() {
        eprintln!("\n{} file(s) failed to check:", failures.len());
        for (path, error) in &failures {
            eprintln!("  {}: {}", path.display(), error);
        }
    }

    let has_errors = output_results(&results, format)?;

    Ok(has_errors || !failures.is_empty())
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::from_file(path).into_diagnostic();
    }

    if let Some(path) = Config::discover(".") {
        info!("Using config: {}", path.display());
        return Config::from_file(&path).into_diagnostic();
    }

    info!("No config file found, using defaults");
    Ok(Config::new())
}

fn output_results(results: &[CheckResult], format: &str) -> Result<bool> {
    let has_errors = results.iter().any(|r| r.set.has_errors());

    match format {
        "json" => {
            let output: Vec<_> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "path": r.path.display().to_string(),
                        "summary": r.set.summary(),
                        "diagnostics": r.set.diagnostics(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&output).into_diagnostic()?
            );
        }
        _ => {
            // Text format
            for result in results {
                if result.set.is_empty() {
                    continue;
                }

                println!("\n{}:", result.path.display());
                for diag in result.set.diagnostics() {
                    println!("  {}", render_diagnostic(diag));
                }
            }

            let mut errors = 0usize;
            let mut warnings = 0usize;
            for result in results {
                let summary = result.set.summary();
                errors += summary.errors;
                warnings += summary.warnings;
            }

            println!();
            println!(
                "Checked {} file(s): {} error(s), {} warning(s)",
                results.len(),
                errors,
                warnings
            );
        }
    }

    Ok(has_errors)
}

/// Renders one diagnostic as a terminal row. Lines are 1-based for
/// display, matching how betty itself reports them.
fn render_diagnostic(diag: &Diagnostic) -> String {
    let severity = match diag.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    format!(
        "{}:{} {}: {}",
        diag.line + 1,
        diag.span.start.max(0),
        severity,
        diag.message
    )
}

/// Summary of applied (or planned) fixes.
#[derive(Default)]
struct FixSummary {
    total_edits: usize,
    files_changed: usize,
    edits_by_file: Vec<(PathBuf, usize)>,
}

fn run_fix(files: &[PathBuf], dry_run: bool, max_passes: usize) -> Result<bool> {
    let mut summary = FixSummary::default();
    let mut failed = 0usize;

    for path in files {
        let run = if dry_run {
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    error!("Failed to read {}: {}", path.display(), e);
                    failed += 1;
                    continue;
                }
            };
            fix_until_clean(&content, max_passes)
        } else {
            match fix_file(path, max_passes) {
                Ok(run) => run,
                Err(e) => {
                    error!("Failed to fix {}: {}", path.display(), e);
                    failed += 1;
                    continue;
                }
            }
        };

        match run.convergence {
            FixConvergence::MaxPassesReached => {
                warn!(
                    "{}: fixes kept appearing after {} passes; rerun to continue",
                    path.display(),
                    max_passes
                );
            }
            FixConvergence::CycleDetected { cycle_length } => {
                warn!(
                    "{}: fix passes repeated with period {}; stopped",
                    path.display(),
                    cycle_length
                );
            }
            FixConvergence::Converged { .. } => {}
        }

        if run.edits_applied > 0 {
            summary.total_edits += run.edits_applied;
            summary.files_changed += 1;
            summary
                .edits_by_file
                .push((path.clone(), run.edits_applied));
        }
    }

    output_fix_summary(&summary, dry_run);

    Ok(failed > 0)
}

/// Outputs the fix summary.
fn output_fix_summary(summary: &FixSummary, dry_run: bool) {
    if summary.total_edits == 0 {
        println!("No fixable issues found.");
        return;
    }

    if dry_run {
        println!(
            "\nWould apply {} edit(s) in {} file(s):",
            summary.total_edits, summary.files_changed
        );
        for (path, count) in &summary.edits_by_file {
            println!("  {}: {} edit(s)", path.display(), count);
        }
        println!("\nRun without --dry-run to apply fixes.");
    } else {
        println!(
            "\nApplied {} edit(s) in {} file(s):",
            summary.total_edits, summary.files_changed
        );
        for (path, count) in &summary.edits_by_file {
            println!("  {}: {} edit(s)", path.display(), count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bettyfix_core::Span;

    #[test]
    fn test_render_diagnostic_is_one_based_for_display() {
        let diag = Diagnostic::new(2, Severity::Error, "missing semicolon", Span::new(1, 12));
        assert_eq!(render_diagnostic(&diag), "3:1 error: missing semicolon");
    }

    #[test]
    fn test_render_diagnostic_clamps_negative_column() {
        let diag = Diagnostic::new(0, Severity::Warning, "line too long", Span::new(-1, -1));
        assert_eq!(render_diagnostic(&diag), "1:0 warning: line too long");
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("betty.jsonc");
        std::fs::write(&path, r#"{ "betty_path": "/opt/betty/bin/betty" }"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.betty_path, "/opt/betty/bin/betty");
    }

    #[test]
    fn test_load_config_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("betty.jsonc");
        std::fs::write(&path, r#"{ "betty_path": 7 }"#).unwrap();

        assert!(load_config(Some(&path)).is_err());
    }
}

//! # bettyfix_runner
//!
//! Invokes the external betty executable and hands its raw report text to
//! the core engine. This is the only place bettyfix touches a subprocess;
//! everything downstream works on plain strings.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use bettyfix_core::{Config, output_reports_missing_tool};

/// Errors from invoking betty.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The betty executable could not be found, either at spawn time or
    /// reported in band by a wrapper shell.
    #[error("betty executable not found")]
    ToolMissing,

    /// Betty ran longer than the configured timeout.
    #[error("betty timed out after {0:?}")]
    Timeout(Duration),

    /// The path has no file name to hand to betty.
    #[error("not a checkable path: {0}")]
    InvalidPath(String),

    /// The process could not be spawned or awaited.
    #[error("failed to run betty: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs betty against single files.
///
/// Betty is started from the file's own directory with the bare file name
/// as its argument, so its report headers carry the name exactly as given.
/// The child is killed if the surrounding future is dropped.
#[derive(Debug, Clone)]
pub struct BettyRunner {
    config: Config,
}

impl BettyRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs betty for one file and returns its merged stderr and stdout,
    /// stderr first, the way the report reads in a terminal.
    pub async fn run(&self, path: &Path) -> Result<String, RunnerError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RunnerError::InvalidPath(path.display().to_string()))?;

        let mut command = Command::new(&self.config.betty_path);
        command
            .args(&self.config.args)
            .arg(file_name)
            .kill_on_drop(true);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(parent);
        }

        debug!(betty = %self.config.betty_path, file = %file_name, "invoking betty");

        let result = match self.config.timeout_ms {
            Some(ms) => {
                let limit = Duration::from_millis(ms);
                tokio::time::timeout(limit, command.output())
                    .await
                    .map_err(|_| RunnerError::Timeout(limit))?
            }
            None => command.output().await,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunnerError::ToolMissing);
            }
            Err(e) => return Err(RunnerError::Io(e)),
        };

        let mut merged = String::from_utf8_lossy(&output.stderr).into_owned();
        merged.push_str(&String::from_utf8_lossy(&output.stdout));

        // A wrapper shell can swallow the spawn failure and report it in band.
        if output_reports_missing_tool(&merged) {
            return Err(RunnerError::ToolMissing);
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_with(betty_path: &str, args: &[&str], timeout_ms: Option<u64>) -> BettyRunner {
        BettyRunner::new(Config {
            betty_path: betty_path.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_ms,
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_merges_output() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.c");
        std::fs::write(&file, "int x;\n").unwrap();

        // echo stands in for betty; the argument comes back on stdout.
        let runner = runner_with("echo", &[], None);
        let output = runner.run(&file).await.unwrap();
        assert_eq!(output.trim(), "main.c");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_passes_bare_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("queue.c");
        std::fs::write(&file, "int x;\n").unwrap();

        let runner = runner_with("echo", &["prefix"], None);
        let output = runner.run(&file).await.unwrap();
        assert_eq!(output.trim(), "prefix queue.c");
    }

    #[tokio::test]
    async fn test_run_missing_executable() {
        let runner = runner_with("betty-executable-that-does-not-exist", &[], None);
        let result = runner.run(Path::new("main.c")).await;
        assert!(matches!(result, Err(RunnerError::ToolMissing)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_detects_in_band_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.c");
        std::fs::write(&file, "int x;\n").unwrap();

        // A wrapper that exists but reports the real tool missing.
        let runner = runner_with("sh", &["-c", "echo 'sh: 1: betty: not found'", "betty"], None);
        let result = runner.run(&file).await;
        assert!(matches!(result, Err(RunnerError::ToolMissing)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.c");
        std::fs::write(&file, "int x;\n").unwrap();

        let runner = runner_with("sh", &["-c", "sleep 5"], Some(50));
        let result = runner.run(&file).await;
        assert!(matches!(result, Err(RunnerError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_run_rejects_bare_root() {
        let runner = runner_with("echo", &[], None);
        let result = runner.run(Path::new("/")).await;
        assert!(matches!(result, Err(RunnerError::InvalidPath(_))));
    }
}

//! Build result types.
//!
//! Contains types for representing the outcome of a compile run.

use crate::compiler::CompileError;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single source in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// Compiled and written
    Success,
    /// Not attempted because the run ended early
    Skipped,
    /// Compilation failed with error
    Failed(String),
}

impl BuildStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, BuildStatus::Failed(_))
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "success"),
            BuildStatus::Skipped => write!(f, "skipped"),
            BuildStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of compiling a single source.
#[derive(Debug, Clone)]
pub struct TargetResult {
    /// Source path, relative to the source directory
    pub source: PathBuf,
    /// Build status
    pub status: BuildStatus,
    /// CSS file written, if any
    pub output: Option<PathBuf>,
    /// The compile error behind a failed status
    pub error: Option<CompileError>,
    /// Time spent on this source
    pub duration: Duration,
}

impl TargetResult {
    /// Create a successful result.
    pub fn success(source: PathBuf, output: PathBuf, duration: Duration) -> Self {
        Self { source, status: BuildStatus::Success, output: Some(output), error: None, duration }
    }

    /// Create a skipped result.
    pub fn skipped(source: PathBuf) -> Self {
        Self {
            source,
            status: BuildStatus::Skipped,
            output: None,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a failed result from a compile error.
    pub fn failed(source: PathBuf, error: CompileError, duration: Duration) -> Self {
        Self {
            source,
            status: BuildStatus::Failed(error.to_string()),
            output: None,
            error: Some(error),
            duration,
        }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete compile run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each source, in processing order
    pub targets: Vec<TargetResult>,
    /// Total run duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target result.
    pub fn add_result(&mut self, result: TargetResult) {
        self.targets.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get the number of compiled sources.
    pub fn success_count(&self) -> usize {
        self.targets.iter().filter(|r| r.status.is_success()).count()
    }

    /// Get the number of sources the run never reached.
    pub fn skipped_count(&self) -> usize {
        self.targets.iter().filter(|r| matches!(r.status, BuildStatus::Skipped)).count()
    }

    /// Get the number of failed sources.
    pub fn failed_count(&self) -> usize {
        self.targets.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the run succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get the compile errors of failed sources.
    pub fn errors(&self) -> Vec<&CompileError> {
        self.targets.iter().filter_map(|r| r.error.as_ref()).collect()
    }

    /// One-line summary of the run.
    pub fn summary(&self) -> String {
        let compiled = self.success_count();
        let failed = self.failed_count();

        if failed > 0 {
            format!(
                "compile failed: {} error{}, {} compiled, {} skipped ({})",
                failed,
                if failed == 1 { "" } else { "s" },
                compiled,
                self.skipped_count(),
                format_duration(self.total_duration)
            )
        } else {
            format!(
                "compiled {} stylesheet{} in {}",
                compiled,
                if compiled == 1 { "" } else { "s" },
                format_duration(self.total_duration)
            )
        }
    }
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

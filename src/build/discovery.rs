//! Source set discovery.
//!
//! The source set is every file under the source directory matching one of
//! the include patterns and none of the exclude patterns. Patterns are
//! relative to the source directory and `*` never crosses a `/`, so the
//! default `*.less` only picks up top-level files.

use crate::config::SourcesConfig;
use glob::{glob_with, MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// The source directory does not exist
    #[error("Source directory not found: {}", .0.display())]
    SourceDirNotFound(PathBuf),
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A source file and its location below the source directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Full path to the source
    pub path: PathBuf,
    /// Path relative to the source directory
    pub relative: PathBuf,
}

impl SourceFile {
    /// Where the compiled CSS for this source is written.
    ///
    /// The relative directory structure is kept, so top-level sources land
    /// directly in `out_dir`.
    pub fn output_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(self.relative.with_extension("css"))
    }

    /// Display name used in logs and target ids.
    pub fn name(&self) -> String {
        self.relative.display().to_string()
    }
}

/// Compiled include/exclude patterns.
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl SourceMatcher {
    /// Compile the patterns of a `[sources]` section.
    pub fn new(sources: &SourcesConfig) -> Result<Self, DiscoveryError> {
        Ok(Self { include: compile(&sources.include)?, exclude: compile(&sources.exclude)? })
    }

    /// Whether `relative` belongs to the source set.
    pub fn matches(&self, relative: &Path) -> bool {
        self.include.iter().any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
            && !self.is_excluded(relative)
    }

    /// Whether `relative` falls under an exclude pattern.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.exclude.iter().any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }

    fn include_patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.include.iter()
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, DiscoveryError> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern(p.clone(), e)))
        .collect()
}

/// Discover the source set under `src_dir`, sorted by path.
pub fn discover_sources(
    src_dir: &Path,
    sources: &SourcesConfig,
) -> Result<Vec<SourceFile>, DiscoveryError> {
    if !src_dir.is_dir() {
        return Err(DiscoveryError::SourceDirNotFound(src_dir.to_path_buf()));
    }

    let matcher = SourceMatcher::new(sources)?;
    let base = Pattern::escape(&src_dir.to_string_lossy());
    let mut found = BTreeSet::new();

    for pattern in matcher.include_patterns() {
        let full_pattern = format!("{}/{}", base, pattern.as_str());
        let paths = glob_with(&full_pattern, MATCH_OPTIONS)
            .map_err(|e| DiscoveryError::InvalidPattern(pattern.as_str().to_string(), e))?;

        for entry in paths {
            match entry {
                Ok(path) => {
                    if !path.is_file() {
                        continue;
                    }
                    let Ok(relative) = path.strip_prefix(src_dir).map(Path::to_path_buf) else {
                        continue;
                    };
                    if matcher.matches(&relative) {
                        found.insert(SourceFile { path, relative });
                    }
                }
                Err(e) => {
                    // Unreadable entries are skipped, the rest of the set still compiles
                    warn!("error reading path: {}", e);
                }
            }
        }
    }

    Ok(found.into_iter().collect())
}

//! Build context containing configuration and paths for a run.

use crate::config::StyleConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a compile run.
///
/// All relative paths in the configuration resolve against the project root
/// (the directory holding `stylebuild.toml`, or the working directory).
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: StyleConfig,
    /// Project root directory
    project_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: StyleConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the source directory (resolved against the project root).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Get the output directory (resolved against the project root).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// Directories searched for `@import` targets: the source directory first,
    /// then the configured include paths.
    pub fn include_paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.src_dir())
            .chain(self.config.compiler.include_paths.iter().map(|p| self.resolve_path(p)))
            .collect()
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve a path relative to the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }
}

//! Configuration loading and discovery for `stylebuild.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{CompilerBackend, StyleConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for when no explicit config path is given
pub const CONFIG_FILE_NAME: &str = "stylebuild.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse stylebuild.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", bullet_list(.0))]
    Validation(Vec<String>),
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n")
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override source directory
    pub src: Option<PathBuf>,
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Override compiler backend
    pub backend: Option<CompilerBackend>,
    /// Replace the browserslist queries
    pub browsers: Option<Vec<String>>,
    /// Override watch debounce delay
    pub debounce_ms: Option<u32>,
    /// Compile once when watch mode starts
    pub initial_build: Option<bool>,
}

/// Find stylebuild.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find stylebuild.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a stylebuild.toml file.
///
/// With `None`, the file is discovered with [`find_config`]; if none is
/// found the defaults are returned.
pub fn load_config(path: Option<&Path>) -> Result<StyleConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(StyleConfig::default()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<StyleConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: StyleConfig = toml::from_str(&contents)?;
    validate(&config)?;
    Ok(config)
}

/// Turn validation findings into a [`ConfigError::Validation`].
pub fn validate(config: &StyleConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()))
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut StyleConfig, overrides: &CliOverrides) {
    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }

    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }

    if let Some(backend) = overrides.backend {
        config.compiler.backend = backend;
    }

    if let Some(ref browsers) = overrides.browsers {
        config.prefix.browsers = browsers.clone();
    }

    if let Some(debounce_ms) = overrides.debounce_ms {
        config.watch.debounce_ms = debounce_ms;
    }

    if let Some(initial_build) = overrides.initial_build {
        config.watch.initial_build = initial_build;
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the stylebuild.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

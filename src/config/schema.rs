//! Configuration schema types for `stylebuild.toml`
//!
//! Every field has a default, so an empty file (or no file at all) reproduces
//! the stock pipeline: `static/less/*.less` compiled into `static/css/` for
//! the last 10 versions of each browser.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which style-language compiler a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompilerBackend {
    /// `lessc` when it can be found, otherwise the builtin compiler
    #[default]
    Auto,
    /// External `lessc` program
    Lessc,
    /// Plain CSS with `@import` inlining
    Builtin,
}

impl std::fmt::Display for CompilerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompilerBackend::Auto => write!(f, "auto"),
            CompilerBackend::Lessc => write!(f, "lessc"),
            CompilerBackend::Builtin => write!(f, "builtin"),
        }
    }
}

/// Source and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory holding the stylesheet sources
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Directory receiving compiled CSS
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("static/less")
}

fn default_out() -> PathBuf {
    PathBuf::from("static/css")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { src: default_src(), out: default_out() }
    }
}

/// Which files under `project.src` make up the source set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Glob patterns, relative to the source directory
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    /// Glob patterns removed from the matches (partials only reached via `@import`)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["*.less".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec!["modules/**".to_string(), "helpers/**".to_string()]
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self { include: default_include(), exclude: default_exclude() }
    }
}

impl SourcesConfig {
    /// File extensions named by the include patterns (`*.less` -> `less`).
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .include
            .iter()
            .filter_map(|pattern| pattern.rsplit_once('.').map(|(_, ext)| ext))
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

/// Style-language compiler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: CompilerBackend,
    /// Program run by the lessc backend
    #[serde(default = "default_lessc")]
    pub lessc: String,
    /// Extra `@import` search paths (the source directory is always searched)
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// End the run at the first compile error
    #[serde(default = "default_true")]
    pub fail_fast: bool,
}

fn default_lessc() -> String {
    "lessc".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            backend: CompilerBackend::Auto,
            lessc: default_lessc(),
            include_paths: vec![],
            fail_fast: true,
        }
    }
}

/// Vendor-prefixing targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixConfig {
    /// Browserslist queries
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

fn default_browsers() -> Vec<String> {
    vec!["last 10 versions".to_string()]
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self { browsers: default_browsers() }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
    /// Also recompile when files under excluded directories change
    #[serde(default)]
    pub partials: bool,
    /// Compile once before waiting for the first change
    #[serde(default)]
    pub initial_build: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: false, partials: false, initial_build: false }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level or filter directive: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Complete stylebuild.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StyleConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub prefix: PrefixConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "sources.include")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stylebuild.toml: '{}' {}", self.field, self.message)
    }
}

impl StyleConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.sources.include.is_empty() {
            errors.push(ConfigValidationError {
                field: "sources.include".to_string(),
                message: "must contain at least one glob pattern".to_string(),
            });
        }

        for (field, patterns) in
            [("sources.include", &self.sources.include), ("sources.exclude", &self.sources.exclude)]
        {
            for pattern in patterns {
                if let Err(e) = glob::Pattern::new(pattern) {
                    errors.push(ConfigValidationError {
                        field: field.to_string(),
                        message: format!("invalid glob pattern '{}': {}", pattern, e),
                    });
                }
            }
        }

        if self.compiler.lessc.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "compiler.lessc".to_string(),
                message: "must be a non-empty program name".to_string(),
            });
        }

        if self.prefix.browsers.is_empty() {
            errors.push(ConfigValidationError {
                field: "prefix.browsers".to_string(),
                message: "must contain at least one browserslist query".to_string(),
            });
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parse() {
        let config: StyleConfig = toml::from_str("").unwrap();
        assert_eq!(config.project.src, PathBuf::from("static/less"));
        assert_eq!(config.project.out, PathBuf::from("static/css"));
        assert_eq!(config.sources.include, vec!["*.less"]);
        assert_eq!(config.sources.exclude, vec!["modules/**", "helpers/**"]);
        assert_eq!(config.compiler.backend, CompilerBackend::Auto);
        assert!(config.compiler.fail_fast);
        assert_eq!(config.prefix.browsers, vec!["last 10 versions"]);
        assert_eq!(config.watch.debounce_ms, 100);
        assert!(!config.watch.partials);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[project]
src = "assets/styles"
out = "public/css"

[sources]
include = ["*.less", "themes/*.less"]
exclude = ["modules/**"]

[compiler]
backend = "builtin"
lessc = "/opt/node/bin/lessc"
include_paths = ["vendor/less"]
fail_fast = false

[prefix]
browsers = ["> 1%", "last 2 versions"]

[watch]
debounce_ms = 250
clear_screen = true
partials = true
initial_build = true

[logging]
level = "debug"
"#;
        let config: StyleConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.project.src, PathBuf::from("assets/styles"));
        assert_eq!(config.project.out, PathBuf::from("public/css"));
        assert_eq!(config.sources.include.len(), 2);
        assert_eq!(config.sources.exclude, vec!["modules/**"]);
        assert_eq!(config.compiler.backend, CompilerBackend::Builtin);
        assert_eq!(config.compiler.lessc, "/opt/node/bin/lessc");
        assert_eq!(config.compiler.include_paths, vec![PathBuf::from("vendor/less")]);
        assert!(!config.compiler.fail_fast);
        assert_eq!(config.prefix.browsers.len(), 2);
        assert_eq!(config.watch.debounce_ms, 250);
        assert!(config.watch.clear_screen);
        assert!(config.watch.partials);
        assert!(config.watch.initial_build);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result: Result<StyleConfig, _> = toml::from_str("[compiler]\nbackend = \"sass\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_empty_include() {
        let mut config = StyleConfig::default();
        config.sources.include.clear();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sources.include");
    }

    #[test]
    fn test_validation_bad_pattern() {
        let mut config = StyleConfig::default();
        config.sources.exclude.push("[broken".to_string());
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sources.exclude");
        assert!(errors[0].to_string().contains("[broken"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = StyleConfig::default();
        config.prefix.browsers.clear();
        config.watch.debounce_ms = 0;
        config.compiler.lessc = "  ".to_string();
        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["compiler.lessc", "prefix.browsers", "watch.debounce_ms"]);
    }

    #[test]
    fn test_source_extensions() {
        let sources = SourcesConfig {
            include: vec!["*.less".into(), "themes/*.LESS".into(), "*.css".into(), "raw".into()],
            exclude: vec![],
        };
        assert_eq!(sources.extensions(), vec!["css", "less"]);
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(CompilerBackend::Auto.to_string(), "auto");
        assert_eq!(CompilerBackend::Lessc.to_string(), "lessc");
        assert_eq!(CompilerBackend::Builtin.to_string(), "builtin");
    }
}

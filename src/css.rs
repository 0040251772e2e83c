//! CSS post-processing stages backed by lightningcss.
//!
//! Stage order within a run is fixed: [`minify`] the compiler output, then
//! [`prefix`] it for the configured browser targets. Both stages print
//! minified CSS, so the final artifact is a single line with no comments.
//!
//! The stages parse with error recovery: rules lightningcss does not
//! understand (old IE hacks and the like) are dropped with a warning instead
//! of failing the source. [`check_syntax`] stays strict.

use lightningcss::error::{Error as CssError, ErrorLocation, ParserError};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::warn;

/// Oldest IE version worth targeting; earlier versions lack every feature
/// that IE needs prefixes for.
const IE_FLOOR: u32 = 10 << 16;

type Warnings<'i> = Arc<RwLock<Vec<CssError<ParserError<'i>>>>>;

/// Failure in a post-processing stage. These abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StageError {
    /// Compiler output could not be re-parsed
    #[error("{stage}: failed to parse CSS for {file}: {message}")]
    Parse { stage: &'static str, file: String, message: String },
    /// lightningcss rejected the stylesheet while minifying or prefixing
    #[error("{stage}: failed to transform {file}: {message}")]
    Transform { stage: &'static str, file: String, message: String },
    /// Printing the stylesheet failed
    #[error("{stage}: failed to print CSS for {file}: {message}")]
    Print { stage: &'static str, file: String, message: String },
    /// A browserslist query could not be resolved
    #[error("invalid browser query {query:?}: {message}")]
    Browsers { query: String, message: String },
}

/// A syntax problem found by [`check_syntax`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub message: String,
    /// 1-indexed (line, column)
    pub location: Option<(usize, usize)>,
}

/// Resolve browserslist queries (e.g. `last 10 versions`) into lightningcss targets.
///
/// lightningcss prefixes for the oldest version of each browser, so IE is
/// raised to version 10. Otherwise IE 5.5 from `last 10 versions` would
/// suppress the `-ms-` flexbox and grid fallbacks.
pub fn resolve_targets(queries: &[String]) -> Result<Targets, StageError> {
    let mut browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| StageError::Browsers { query: queries.join(", "), message: e.to_string() })?;
    if let Some(browsers) = browsers.as_mut() {
        if let Some(ie) = browsers.ie.as_mut() {
            *ie = (*ie).max(IE_FLOOR);
        }
    }
    Ok(Targets { browsers, ..Targets::default() })
}

fn line_column(loc: &Option<ErrorLocation>) -> Option<(usize, usize)> {
    // lightningcss lines are 0-indexed, columns 1-indexed
    loc.as_ref().map(|l| (l.line as usize + 1, l.column as usize))
}

fn parser_options<'i>(
    filename: &str,
    warnings: Option<Warnings<'i>>,
) -> ParserOptions<'i> {
    ParserOptions {
        filename: filename.to_string(),
        error_recovery: warnings.is_some(),
        warnings,
        ..ParserOptions::default()
    }
}

/// Parse `code` and report the first syntax error, if any.
pub fn check_syntax(filename: &str, code: &str) -> Result<(), SyntaxIssue> {
    StyleSheet::parse(code, parser_options(filename, None))
        .map(|_| ())
        .map_err(|e| SyntaxIssue { message: e.kind.to_string(), location: line_column(&e.loc) })
}

/// Shared parse -> minify -> print chain; `targets` decides whether prefixes are added.
fn transform(
    stage: &'static str,
    filename: &str,
    code: &str,
    targets: Targets,
) -> Result<String, StageError> {
    let warnings: Warnings = Arc::new(RwLock::new(Vec::new()));
    let mut stylesheet = StyleSheet::parse(code, parser_options(filename, Some(warnings.clone())))
        .map_err(|e| StageError::Parse {
            stage,
            file: filename.to_string(),
            message: e.to_string(),
        })?;

    if let Ok(warnings) = warnings.read() {
        for warning in warnings.iter() {
            warn!("{}: {}: dropped invalid CSS: {}", stage, filename, warning);
        }
    }

    stylesheet
        .minify(MinifyOptions { targets: targets.clone(), ..MinifyOptions::default() })
        .map_err(|e| StageError::Transform {
            stage,
            file: filename.to_string(),
            message: e.to_string(),
        })?;

    let printed = stylesheet
        .to_css(PrinterOptions { minify: true, targets, ..PrinterOptions::default() })
        .map_err(|e| StageError::Print {
            stage,
            file: filename.to_string(),
            message: e.to_string(),
        })?;

    Ok(printed.code)
}

/// Minify compiler output: whitespace and comments removed, rules merged.
pub fn minify(filename: &str, code: &str) -> Result<String, StageError> {
    transform("minify", filename, code, Targets::default())
}

/// Add vendor-prefixed declarations required by `targets`.
pub fn prefix(filename: &str, code: &str, targets: &Targets) -> Result<String, StageError> {
    transform("prefix", filename, code, targets.clone())
}

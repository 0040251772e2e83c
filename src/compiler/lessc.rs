//! LESS compilation through the external `lessc` program.
//!
//! `lessc --no-color --include-path=<paths> <file>` prints CSS on stdout.
//! On failure it exits non-zero and describes the problem on stderr, e.g.
//! `ParseError: Unrecognised input in /site/a.less on line 3, column 5:`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{CompileError, CompileErrorKind, StyleCompiler};

/// Runs `lessc` once per source file
#[derive(Debug, Clone)]
pub struct LesscCompiler {
    program: PathBuf,
    include_paths: Vec<PathBuf>,
}

impl LesscCompiler {
    pub fn new(program: impl Into<PathBuf>, include_paths: Vec<PathBuf>) -> Self {
        Self { program: program.into(), include_paths }
    }

    fn args(&self, source: &Path) -> Vec<OsString> {
        let mut args = vec![OsString::from("--no-color")];
        if !self.include_paths.is_empty() {
            if let Ok(joined) = std::env::join_paths(&self.include_paths) {
                let mut arg = OsString::from("--include-path=");
                arg.push(joined);
                args.push(arg);
            }
        }
        args.push(source.as_os_str().to_os_string());
        args
    }
}

impl StyleCompiler for LesscCompiler {
    fn name(&self) -> &'static str {
        "lessc"
    }

    fn compile(&self, source: &Path) -> Result<String, CompileError> {
        debug!(program = %self.program.display(), source = %source.display(), "running lessc");

        let output = Command::new(&self.program).args(self.args(source)).output().map_err(|e| {
            CompileError::new(
                CompileErrorKind::Backend,
                source,
                format!("failed to run '{}': {}", self.program.display(), e),
            )
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(parse_failure(source, &String::from_utf8_lossy(&output.stderr)))
        }
    }
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<kind>\w+Error): (?P<message>.*?)(?: in (?P<file>.+?))?",
            r" on line (?P<line>\d+), column (?P<column>\d+):?",
        ))
        .expect("location pattern is valid")
    })
}

/// Turn lessc's stderr into a [`CompileError`].
///
/// `FileError` means an `@import` could not be resolved; every other error
/// class is reported as a syntax error.
pub(crate) fn parse_failure(source: &Path, stderr: &str) -> CompileError {
    let first_line = stderr.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");

    if first_line.is_empty() {
        return CompileError::new(CompileErrorKind::Syntax, source, "lessc failed without output");
    }

    match location_pattern().captures(first_line) {
        Some(caps) => {
            let kind = match &caps["kind"] {
                "FileError" => CompileErrorKind::UnresolvedImport,
                _ => CompileErrorKind::Syntax,
            };
            let file = caps
                .name("file")
                .map(|m| PathBuf::from(m.as_str()))
                .unwrap_or_else(|| source.to_path_buf());
            let message = format!("{}: {}", &caps["kind"], &caps["message"]);
            let error = CompileError::new(kind, file, message);
            match (caps["line"].parse::<usize>(), caps["column"].parse::<usize>()) {
                (Ok(line), Ok(column)) => error.at(line, column),
                (Ok(line), Err(_)) => error.at_line(line),
                _ => error,
            }
        }
        None => {
            let kind = if first_line.starts_with("FileError") {
                CompileErrorKind::UnresolvedImport
            } else {
                CompileErrorKind::Syntax
            };
            CompileError::new(kind, source, first_line)
        }
    }
}

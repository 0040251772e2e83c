//! Style-language compilation, the first stage of every run.
//!
//! A [`StyleCompiler`] turns one source file into CSS text. Two backends
//! exist: [`LesscCompiler`] runs the external LESS compiler and
//! [`BuiltinCompiler`] handles plain CSS sources with `@import` inlining.
//! A failure here is a [`CompileError`], the one error a run logs and
//! recovers from.

mod builtin;
mod lessc;

pub use builtin::BuiltinCompiler;
pub use lessc::LesscCompiler;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{CompilerBackend, CompilerConfig};

/// What went wrong while compiling a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Invalid style-language syntax
    Syntax,
    /// An `@import` that could not be found
    UnresolvedImport,
    /// A file that (transitively) imports itself
    CircularImport,
    /// The source file could not be read
    Read,
    /// The compiler program could not be run
    Backend,
}

impl std::fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileErrorKind::Syntax => write!(f, "syntax error"),
            CompileErrorKind::UnresolvedImport => write!(f, "unresolved import"),
            CompileErrorKind::CircularImport => write!(f, "circular import"),
            CompileErrorKind::Read => write!(f, "read error"),
            CompileErrorKind::Backend => write!(f, "compiler error"),
        }
    }
}

/// A compile error with file location information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Error category
    pub kind: CompileErrorKind,
    /// Path to the file containing the error
    pub file: PathBuf,
    /// Line number (1-indexed, None if unknown)
    pub line: Option<usize>,
    /// Column number (1-indexed, None if unknown)
    pub column: Option<usize>,
    /// Error message
    pub message: String,
}

impl CompileError {
    /// Create a new compile error with file and message
    pub fn new(
        kind: CompileErrorKind,
        file: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self { kind, file: file.into(), line: None, column: None, message: message.into() }
    }

    /// Attach a line number
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach a line and column
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.kind, self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(col) = self.column {
                write!(f, ":{}", col)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Compiles one style-language source file to CSS.
pub trait StyleCompiler: Send + Sync {
    /// Short backend name used in log output
    fn name(&self) -> &'static str;

    /// Compile `source` and return the CSS text.
    fn compile(&self, source: &Path) -> Result<String, CompileError>;
}

/// Build the compiler a run should use.
///
/// `include_paths` are the directories searched for `@import` targets after
/// the importing file's own directory.
pub fn select_compiler(
    config: &CompilerConfig,
    include_paths: Vec<PathBuf>,
) -> Box<dyn StyleCompiler> {
    match config.backend {
        CompilerBackend::Lessc => Box::new(LesscCompiler::new(&config.lessc, include_paths)),
        CompilerBackend::Builtin => Box::new(BuiltinCompiler::new(include_paths)),
        CompilerBackend::Auto => match find_program(&config.lessc) {
            Some(program) => {
                debug!(program = %program.display(), "using lessc backend");
                Box::new(LesscCompiler::new(program, include_paths))
            }
            None => {
                warn!(
                    "'{}' not found, falling back to the builtin compiler (plain CSS only)",
                    config.lessc
                );
                Box::new(BuiltinCompiler::new(include_paths))
            }
        },
    }
}

/// Locate a program either by explicit path or on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        program_names(program).into_iter().map(|name| dir.join(name)).find(|p| p.is_file())
    })
}

#[cfg(windows)]
fn program_names(program: &str) -> Vec<String> {
    vec![format!("{}.cmd", program), format!("{}.exe", program), program.to_string()]
}

#[cfg(not(windows))]
fn program_names(program: &str) -> Vec<String> {
    vec![program.to_string()]
}

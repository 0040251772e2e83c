//! The compile operation.
//!
//! A run discovers the source set, then streams each source through the
//! stages compile → minify → prefix → write before moving to the next one.
//! A compile error is logged and, with fail-fast on, ends the run: the
//! remaining sources are reported as skipped and nothing already written is
//! rolled back. Failures in the later stages abort the run with a
//! [`BuildError`].

use crate::build::{
    discover_sources, BuildContext, BuildResult, DiscoveryError, SourceFile, TargetResult,
};
use crate::compiler::{select_compiler, StyleCompiler};
use crate::css::{self, StageError};
use lightningcss::targets::Targets;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Error that aborts a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    /// Minify or prefix stage failed, or the browser list is invalid
    #[error(transparent)]
    Stage(#[from] StageError),
    /// Output could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runs the compile operation for a [`BuildContext`].
pub struct BuildPipeline {
    /// Build context
    context: BuildContext,
    /// Style-language compiler
    compiler: Box<dyn StyleCompiler>,
    /// Whether to stop at the first compile error
    fail_fast: bool,
}

impl BuildPipeline {
    /// Create a pipeline using the compiler backend selected by the config.
    pub fn new(context: BuildContext) -> Self {
        let compiler = select_compiler(&context.config().compiler, context.include_paths());
        let fail_fast = context.config().compiler.fail_fast;
        Self { context, compiler, fail_fast }
    }

    /// Replace the style-language compiler.
    pub fn with_compiler(mut self, compiler: Box<dyn StyleCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Set fail-fast mode (stop on first compile error).
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Get the build context.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Name of the compiler backend in use.
    pub fn compiler_name(&self) -> &'static str {
        self.compiler.name()
    }

    /// The source set this pipeline would compile.
    pub fn sources(&self) -> Result<Vec<SourceFile>, BuildError> {
        Ok(discover_sources(&self.context.src_dir(), &self.context.config().sources)?)
    }

    /// Run the compile operation once.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let targets = css::resolve_targets(&self.context.config().prefix.browsers)?;
        let sources = self.sources()?;
        let out_dir = self.context.out_dir();

        if sources.is_empty() {
            warn!("no sources matched in {}", self.context.src_dir().display());
        }
        debug!(compiler = self.compiler.name(), sources = sources.len(), "starting run");

        let mut result = BuildResult::new();
        let mut remaining = sources.iter();

        while let Some(source) = remaining.next() {
            let target = self.compile_source(source, &out_dir, &targets)?;
            let failed = target.status.is_failure();
            result.add_result(target);

            if failed && self.fail_fast {
                for rest in remaining.by_ref() {
                    result.add_result(TargetResult::skipped(rest.relative.clone()));
                }
                break;
            }
        }

        Ok(result.with_duration(start.elapsed()))
    }

    /// Run one source through every stage.
    fn compile_source(
        &self,
        source: &SourceFile,
        out_dir: &Path,
        targets: &Targets,
    ) -> Result<TargetResult, BuildError> {
        let start = Instant::now();

        if self.context.is_verbose() {
            info!("compiling {}", source.name());
        }

        let compiled = match self.compiler.compile(&source.path) {
            Ok(css) => css,
            Err(e) => {
                error!("{}: {}", source.name(), e);
                return Ok(TargetResult::failed(source.relative.clone(), e, start.elapsed()));
            }
        };

        let name = source.path.display().to_string();
        let minified = css::minify(&name, &compiled)?;
        let prefixed = css::prefix(&name, &minified, targets)?;

        let output = source.output_path(out_dir);
        write_output(&output, &prefixed)?;
        debug!(output = %output.display(), bytes = prefixed.len(), "wrote");

        Ok(TargetResult::success(source.relative.clone(), output, start.elapsed()))
    }
}

/// Run the compile operation for `context` with its configured compiler.
pub fn compile(context: &BuildContext) -> Result<BuildResult, BuildError> {
    BuildPipeline::new(context.clone()).build()
}

fn write_output(path: &Path, css: &str) -> Result<(), BuildError> {
    let write_error = |source| BuildError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, css).map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildStatus;
    use crate::compiler::{CompileError, CompileErrorKind};
    use crate::config::StyleConfig;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Passes files through unchanged, failing any file whose name starts with "bad"
    #[derive(Default)]
    struct RecordingCompiler {
        seen: Mutex<Vec<String>>,
    }

    impl StyleCompiler for RecordingCompiler {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn compile(&self, source: &Path) -> Result<String, CompileError> {
            let name = source.file_name().unwrap().to_string_lossy().into_owned();
            self.seen.lock().unwrap().push(name.clone());
            if name.starts_with("bad") {
                return Err(CompileError::new(CompileErrorKind::Syntax, source, "broken").at(1, 1));
            }
            std::fs::read_to_string(source)
                .map_err(|e| CompileError::new(CompileErrorKind::Read, source, e.to_string()))
        }
    }

    fn setup(files: &[(&str, &str)]) -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("static/less");
        fs::create_dir_all(&src).unwrap();
        for (name, content) in files {
            let path = src.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = BuildContext::new(StyleConfig::default(), temp.path().to_path_buf());
        (temp, ctx)
    }

    #[test]
    fn test_build_writes_one_css_per_source() {
        let (temp, ctx) = setup(&[
            ("a.less", ".a { margin: 0px; }"),
            ("b.less", ".b {\n  padding: 0px;\n}\n"),
            ("modules/m.less", ".m { margin: 0px; }"),
        ]);

        let compiler = Box::new(RecordingCompiler::default());
        let result = BuildPipeline::new(ctx).with_compiler(compiler).build().unwrap();

        assert!(result.is_success());
        assert_eq!(result.success_count(), 2);
        let out = temp.path().join("static/css");
        assert_eq!(fs::read_to_string(out.join("a.css")).unwrap(), ".a{margin:0}");
        assert_eq!(fs::read_to_string(out.join("b.css")).unwrap(), ".b{padding:0}");
        assert!(!out.join("m.css").exists());
        assert!(!out.join("modules").exists());
    }

    #[test]
    fn test_fail_fast_skips_remaining_sources() {
        let (temp, ctx) = setup(&[
            ("a.less", ".a { color: red; }"),
            ("bad.less", ".x {}"),
            ("c.less", ".c { color: red; }"),
        ]);

        let compiler = Box::new(RecordingCompiler::default());
        let pipeline = BuildPipeline::new(ctx).with_compiler(compiler).with_fail_fast(true);
        let result = pipeline.build().unwrap();

        let statuses: Vec<&BuildStatus> = result.targets.iter().map(|t| &t.status).collect();
        assert!(matches!(statuses[0], BuildStatus::Success));
        assert!(matches!(statuses[1], BuildStatus::Failed(_)));
        assert!(matches!(statuses[2], BuildStatus::Skipped));

        let out = temp.path().join("static/css");
        assert!(out.join("a.css").exists());
        assert!(!out.join("bad.css").exists());
        assert!(!out.join("c.css").exists());
    }

    #[test]
    fn test_without_fail_fast_continues() {
        let (temp, ctx) = setup(&[("bad.less", ".x {}"), ("c.less", ".c { color: red; }")]);

        let pipeline = BuildPipeline::new(ctx)
            .with_compiler(Box::new(RecordingCompiler::default()))
            .with_fail_fast(false);
        let result = pipeline.build().unwrap();

        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.success_count(), 1);
        assert!(temp.path().join("static/css/c.css").exists());
    }

    #[test]
    fn test_missing_source_dir_is_error() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(StyleConfig::default(), temp.path().to_path_buf());
        let result = BuildPipeline::new(ctx).build();
        assert!(matches!(
            result,
            Err(BuildError::Discovery(DiscoveryError::SourceDirNotFound(_)))
        ));
    }

    #[test]
    fn test_invalid_browser_query_is_error() {
        let (_temp, mut ctx) = setup(&[("a.less", ".a { color: red; }")]);
        let mut config = ctx.config().clone();
        config.prefix.browsers = vec!["no such browsers please".to_string()];
        ctx = BuildContext::new(config, ctx.project_root().to_path_buf());

        let result = BuildPipeline::new(ctx).build();
        assert!(matches!(result, Err(BuildError::Stage(StageError::Browsers { .. }))));
    }

    #[test]
    fn test_invalid_rules_in_compiler_output_are_dropped() {
        let (temp, ctx) = setup(&[("a.less", "..nope { color: red; }\n.a { margin: 0px; }")]);

        let compiler = Box::new(RecordingCompiler::default());
        let result = BuildPipeline::new(ctx).with_compiler(compiler).build().unwrap();

        assert!(result.is_success());
        let css = fs::read_to_string(temp.path().join("static/css/a.css")).unwrap();
        assert_eq!(css, ".a{margin:0}");
    }

    #[test]
    fn test_unwritable_output_aborts_run() {
        let (temp, ctx) = setup(&[("a.less", ".a { margin: 0px; }")]);
        fs::write(temp.path().join("static/css"), "not a directory").unwrap();

        let compiler = Box::new(RecordingCompiler::default());
        let result = BuildPipeline::new(ctx).with_compiler(compiler).build();
        assert!(matches!(result, Err(BuildError::Write { .. })));
    }

    #[test]
    fn test_build_records_total_duration() {
        let (_temp, ctx) = setup(&[("a.less", ".a { margin: 0px; }")]);

        let compiler = Box::new(RecordingCompiler::default());
        let result = BuildPipeline::new(ctx).with_compiler(compiler).build().unwrap();
        assert!(result.total_duration >= result.targets[0].duration);
    }

    #[test]
    fn test_sources_lists_source_set() {
        let (_temp, ctx) = setup(&[("a.less", ""), ("helpers/h.less", "")]);
        let pipeline = BuildPipeline::new(ctx);
        let sources = pipeline.sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].relative, PathBuf::from("a.less"));
    }
}

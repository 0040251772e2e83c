//! Command-line interface implementation
//!
//! Parses arguments with clap and dispatches each subcommand to its
//! implementation module. Shared setup (config discovery, CLI overrides,
//! logging) lives here.

mod compile;
mod watch;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::build::BuildContext;
use crate::config::loader::{
    find_config, load_config, merge_cli_overrides, project_root, validate,
};
use crate::config::{CliOverrides, CompilerBackend};
use crate::logging::init_logging;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// stylebuild - Compile LESS stylesheets into minified, prefixed CSS
#[derive(Parser)]
#[command(name = "stylebuild")]
#[command(about = "Compile LESS stylesheets into minified, vendor-prefixed CSS")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile every source once
    Compile {
        #[command(flatten)]
        args: BuildArgs,

        /// List the sources and their outputs without compiling
        #[arg(long)]
        dry_run: bool,
    },

    /// Recompile whenever a source changes
    Watch {
        #[command(flatten)]
        args: BuildArgs,

        /// Debounce delay in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        debounce: Option<u32>,

        /// Compile once before waiting for changes
        #[arg(long)]
        initial: bool,
    },
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Path to stylebuild.toml (default: search upwards from the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Source directory (default: static/less)
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Output directory (default: static/css)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Style-language compiler
    #[arg(long, value_enum)]
    pub compiler: Option<CompilerArg>,

    /// Browserslist query for vendor prefixes (repeatable, replaces the configured list)
    #[arg(long = "browsers", value_name = "QUERY")]
    pub browsers: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// `--compiler` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompilerArg {
    Auto,
    Lessc,
    Builtin,
}

impl From<CompilerArg> for CompilerBackend {
    fn from(arg: CompilerArg) -> Self {
        match arg {
            CompilerArg::Auto => CompilerBackend::Auto,
            CompilerArg::Lessc => CompilerBackend::Lessc,
            CompilerArg::Builtin => CompilerBackend::Builtin,
        }
    }
}

impl BuildArgs {
    /// Overrides named by these arguments, on top of `extra`.
    fn overrides(&self, extra: CliOverrides) -> CliOverrides {
        CliOverrides {
            src: self.src.clone(),
            out: self.out.clone(),
            backend: self.compiler.map(CompilerBackend::from),
            browsers: (!self.browsers.is_empty()).then(|| self.browsers.clone()),
            ..extra
        }
    }
}

/// Load the configuration, apply overrides, and start logging.
///
/// Errors are reported on stderr before logging exists, so the caller only
/// needs to return the exit code.
pub(crate) fn prepare(args: &BuildArgs, extra: CliOverrides) -> Result<BuildContext, ExitCode> {
    let config_path = match &args.config {
        Some(path) if !path.is_file() => {
            eprintln!("Error: config file not found: {}", path.display());
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
        Some(path) => Some(path.clone()),
        None => find_config(),
    };

    let mut config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
    };

    merge_cli_overrides(&mut config, &args.overrides(extra));
    if let Err(e) = validate(&config) {
        eprintln!("Error: {}", e);
        return Err(ExitCode::from(EXIT_INVALID_ARGS));
    }

    init_logging(&config.logging, args.verbose);

    let cwd = std::env::current_dir().unwrap_or_default();
    let root = match &config_path {
        Some(path) => {
            tracing::debug!("using config: {}", path.display());
            match project_root(path) {
                Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
                _ => cwd,
            }
        }
        None => {
            tracing::debug!("no stylebuild.toml found, using defaults");
            cwd
        }
    };

    Ok(BuildContext::new(config, root).with_verbose(args.verbose))
}

/// Parse arguments and run the selected subcommand
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { args, dry_run } => compile::run_compile(&args, dry_run),
        Commands::Watch { args, debounce, initial } => watch::run_watch(&args, debounce, initial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile_args() {
        let cli = Cli::try_parse_from([
            "stylebuild",
            "compile",
            "--src",
            "less",
            "--compiler",
            "builtin",
            "--browsers",
            "last 2 versions",
            "--browsers",
            "ie 11",
            "--dry-run",
        ])
        .unwrap();

        let Commands::Compile { args, dry_run } = cli.command else {
            panic!("expected compile");
        };
        assert!(dry_run);
        assert_eq!(args.src, Some(PathBuf::from("less")));
        assert_eq!(args.compiler, Some(CompilerArg::Builtin));

        let overrides = args.overrides(CliOverrides::default());
        assert_eq!(overrides.backend, Some(CompilerBackend::Builtin));
        assert_eq!(
            overrides.browsers,
            Some(vec!["last 2 versions".to_string(), "ie 11".to_string()])
        );
    }

    #[test]
    fn test_parse_watch_args() {
        let cli =
            Cli::try_parse_from(["stylebuild", "watch", "--debounce", "250", "--initial", "-v"])
                .unwrap();
        let Commands::Watch { args, debounce, initial } = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(debounce, Some(250));
        assert!(initial);
        assert!(args.verbose);
        assert_eq!(args.overrides(CliOverrides::default()).browsers, None);
    }

    #[test]
    fn test_zero_debounce_rejected() {
        assert!(Cli::try_parse_from(["stylebuild", "watch", "--debounce", "0"]).is_err());
    }

    #[test]
    fn test_unknown_compiler_rejected() {
        assert!(Cli::try_parse_from(["stylebuild", "compile", "--compiler", "sass"]).is_err());
    }
}

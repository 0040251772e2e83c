//! Compile command implementation

use std::process::ExitCode;
use tracing::{error, info};

use super::{prepare, BuildArgs, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::BuildPipeline;
use crate::config::CliOverrides;

/// Run the compile command
pub fn run_compile(args: &BuildArgs, dry_run: bool) -> ExitCode {
    let context = match prepare(args, CliOverrides::default()) {
        Ok(context) => context,
        Err(code) => return code,
    };
    let pipeline = BuildPipeline::new(context);

    if dry_run {
        return run_dry(&pipeline);
    }

    match pipeline.build() {
        Ok(result) if result.is_success() => {
            info!("{}", result.summary());
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(result) => {
            error!("{}", result.summary());
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            error!("compile aborted: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// List what a run would compile, without touching the output directory
fn run_dry(pipeline: &BuildPipeline) -> ExitCode {
    let context = pipeline.context();
    let sources = match pipeline.sources() {
        Ok(sources) => sources,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let out_dir = context.out_dir();
    println!("Dry run - would compile:");
    println!("  Source:   {}", context.src_dir().display());
    println!("  Output:   {}", out_dir.display());
    println!("  Compiler: {}", pipeline.compiler_name());
    println!("  Browsers: {}", context.config().prefix.browsers.join(", "));
    println!("  Sources:  {}", sources.len());
    for source in &sources {
        println!("    - {} -> {}", source.name(), source.output_path(&out_dir).display());
    }
    ExitCode::from(EXIT_SUCCESS)
}

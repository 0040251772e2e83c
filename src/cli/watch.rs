//! Watch command implementation

use std::process::ExitCode;
use tracing::{error, info, warn};

use super::{prepare, BuildArgs, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::BuildPipeline;
use crate::config::CliOverrides;
use crate::watch::{watch, SourceWatcher};

/// Run the watch command until Ctrl+C
pub fn run_watch(args: &BuildArgs, debounce: Option<u32>, initial: bool) -> ExitCode {
    let extra = CliOverrides {
        debounce_ms: debounce,
        initial_build: initial.then_some(true),
        ..Default::default()
    };
    let context = match prepare(args, extra) {
        Ok(context) => context,
        Err(code) => return code,
    };

    let config = context.config();
    let watcher = match SourceWatcher::new(&context.src_dir(), &config.sources, &config.watch) {
        Ok(watcher) => watcher,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let stop = watcher.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || stop.stop()) {
        warn!("Ctrl+C handler not installed: {}", e);
    }
    info!("press Ctrl+C to stop");

    match watch(&BuildPipeline::new(context), &watcher) {
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            error!("watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

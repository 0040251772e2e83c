//! Logging setup
//!
//! All output goes through `tracing`; the CLI installs a `fmt` subscriber
//! writing to stderr once at startup.
//!
//! Filter priority (highest to lowest):
//! 1. `STYLEBUILD_LOG` environment variable (any `EnvFilter` directive)
//! 2. `--verbose` (debug)
//! 3. `[logging] level` from the configuration file
//! 4. `info`

use crate::config::schema::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable consulted before any other filter source
pub const LOG_ENV: &str = "STYLEBUILD_LOG";

/// Initialize the logging system.
///
/// Returns false when a global subscriber was already installed (tests,
/// embedding applications); logging then goes to that subscriber.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> bool {
    let directive = filter_directive(std::env::var(LOG_ENV).ok(), verbose, config);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed && EnvFilter::try_new(&directive).is_err() {
        tracing::warn!("invalid log filter {:?}, using info", directive);
    }
    installed
}

/// Pick the filter directive from the sources above.
fn filter_directive(env: Option<String>, verbose: bool, config: &LoggingConfig) -> String {
    match env {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ if verbose => "debug".to_string(),
        _ if config.level.trim().is_empty() => "info".to_string(),
        _ => config.level.trim().to_string(),
    }
}

//! Configuration module for stylebuild
//!
//! Provides types and parsing for `stylebuild.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{CliOverrides, ConfigError};
pub use schema::*;

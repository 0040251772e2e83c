//! stylebuild - LESS stylesheet build pipeline
//!
//! This library provides functionality to:
//! - Discover the stylesheet source set (`static/less/*.less` minus partials)
//! - Compile each source, minify it, and add vendor prefixes
//! - Watch the sources and recompile on change

pub mod build;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod css;
pub mod logging;
pub mod watch;

//! Build pipeline module for stylebuild
//!
//! Provides the compile operation: turning the stylesheet source set into
//! minified, vendor-prefixed CSS.
//!
//! # Overview
//!
//! A run consists of:
//! - **Discovery**: Find the source set using the include/exclude patterns
//! - **Stages**: Compile, minify, prefix, and write each source in turn
//! - **Result**: Collect per-source status into a [`BuildResult`]
//!
//! # Example
//!
//! ```ignore
//! use stylebuild::build::{BuildContext, BuildPipeline};
//! use stylebuild::config::loader::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let result = BuildPipeline::new(context).build()?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod pipeline;
pub mod result;

pub use context::*;
pub use discovery::*;
pub use pipeline::*;
pub use result::*;

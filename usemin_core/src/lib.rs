//! `usemin_core` replaces groups of script and stylesheet references in HTML
//! with references to their optimized outputs, and generates the build-step
//! configuration that produces those outputs.
//!
//! ## Processing Pipeline
//!
//! ```text
//! HTML document
//!   → MarkerParser (finds `<!-- build:<type> <dest> -->` ... `<!-- endbuild -->` blocks)
//!   → ConfigWriter (runs each block through its Flow steps, merges into a config tree)
//!   → DocumentRewriter (replaces blocks with a single tag, rewrites references to revved files)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `usemin.toml`.
//! - [`paths`]: POSIX path helpers used for every generated path.
//!
//! ## Key Types
//!
//! - [`Block`]: One authored group of source files destined for a single output.
//! - [`Flow`]: The ordered steps, and post steps, of each block type.
//! - [`StepConfigGenerator`]: Produces one step's configuration for one block.
//! - [`ConfigWriter`]: Turns documents into a build configuration tree.
//! - [`RevvedFinder`]: Locates revved files on disk or in a revision map.
//! - [`DocumentRewriter`]: Rewrites blocks and asset references in documents.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use usemin_core::{ConfigWriter, ConfigWriterOptions, File, Flow, MarkerParser};
//!
//! let html = "<!-- build:js scripts/site.js -->\n<script src=\"foo.js\"></script>\n<!-- endbuild -->\n";
//! let file = File::parse("app/index.html", html, &MarkerParser).unwrap();
//!
//! let mut writer = ConfigWriter::new(Flow::standard(), ConfigWriterOptions::default());
//! let config = writer.process(&file, None).unwrap();
//! println!("{}", serde_json::to_string_pretty(&config).unwrap());
//! ```

pub use block::*;
pub use config::*;
pub use config_writer::*;
pub use error::*;
pub use flow::*;
pub use parser::*;
pub use patterns::*;
pub use revved_finder::*;
pub use rewriter::*;
pub use steps::*;

mod block;
pub mod config;
mod config_writer;
#[allow(unused_assignments)]
mod error;
mod flow;
mod parser;
mod patterns;
pub mod paths;
mod revved_finder;
mod rewriter;
mod steps;

#[cfg(test)]
mod __fixtures;

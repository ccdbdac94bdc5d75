//! Release packaging pipeline.
//!
//! Resolves pinned native dependencies, builds an application, smoke-tests
//! the result, installs it, bundles it, archives the bundle and publishes the
//! archive as a release asset on a GitHub-compatible API.
//!
//! External processes go through the [`runner::Runner`] trait and downloads
//! through [`stages::Fetch`], so every stage can be driven by fakes.

pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod stages;
pub mod utils;

// Re-export commonly used types
pub use error::{CliError, PipelineError, Result};

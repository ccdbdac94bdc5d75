//! Command line argument parsing and validation.

use crate::config::{DEFAULT_MANIFEST, PipelineOptions};
use clap::Parser;
use std::path::PathBuf;

/// Release packaging pipeline
#[derive(Parser, Debug)]
#[command(
    name = "release_pipeline",
    version,
    about = "Build, smoke-test, bundle, archive and publish an application",
    long_about = "Runs the release pipeline described by a release.toml manifest:

  dependencies -> build -> smoke test -> install -> bundle -> archive -> publish

Archive and publish run only with --with-dist. Publishing is skipped (and the
run still succeeds) when the CI build id or release token is missing.

Usage:
  release_pipeline
  release_pipeline --manifest ci/release.toml --with-dist
  release_pipeline --enable qt-webkit --without-binary"
)]
pub struct Args {
    /// Path to the release manifest
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Binary install prefix, relative to the manifest directory
    #[arg(short, long, value_name = "DIR", default_value = "install")]
    pub prefix: PathBuf,

    /// Debug build; also enables dependency options named `debug`
    #[arg(long)]
    pub debug: bool,

    /// Skip the application bundle
    #[arg(long)]
    pub without_app: bool,

    /// Skip the binary install
    #[arg(long)]
    pub without_binary: bool,

    /// Archive the bundle and publish it as a release
    #[arg(long)]
    pub with_dist: bool,

    /// Enable a dependency build option (repeatable)
    #[arg(short, long = "enable", value_name = "OPTION")]
    pub enable: Vec<String>,

    /// Assume dependencies are already installed
    #[arg(long)]
    pub skip_deps: bool,

    /// List dependency build options and exit
    #[arg(long)]
    pub list_options: bool,

    /// Verbose output (echo command output, debug logs)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.with_dist && self.without_app {
            return Err("--with-dist needs the application bundle; drop --without-app".to_string());
        }
        if let Some(empty) = self.enable.iter().find(|name| name.trim().is_empty()) {
            return Err(format!("Invalid option name: {empty:?}"));
        }
        Ok(())
    }

    /// Pipeline switches selected on the command line
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            debug: self.debug,
            app: !self.without_app,
            binary: !self.without_binary,
            dist: self.with_dist,
        }
    }

    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    verbose: bool,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            verbose: args.verbose,
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Whether command output should be echoed
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print warning message
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }
}

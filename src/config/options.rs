//! Invocation-time build options.

use super::manifest::BuildOption;
use std::collections::BTreeSet;

/// Pipeline switches resolved from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Build dependencies with debug symbols
    pub debug: bool,
    /// Produce the application bundle
    pub app: bool,
    /// Install the plain build into the prefix
    pub binary: bool,
    /// Archive and publish the bundle (CI only)
    pub dist: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            debug: false,
            app: true,
            binary: true,
            dist: false,
        }
    }
}

/// Pipeline switches plus the package options requested by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptionSet {
    /// Pipeline stage switches
    pub pipeline: PipelineOptions,
    /// Package options enabled with `--enable`
    pub enabled: BTreeSet<String>,
}

impl BuildOptionSet {
    /// Creates an option set.
    pub fn new(pipeline: PipelineOptions, enabled: impl IntoIterator<Item = String>) -> Self {
        Self {
            pipeline,
            enabled: enabled.into_iter().collect(),
        }
    }

    /// Whether a package option applies to this run.
    ///
    /// `--debug` turns on every package option named `debug`.
    pub fn package_option_enabled(&self, name: &str, option: &BuildOption) -> bool {
        option.default
            || self.enabled.contains(name)
            || (name == "debug" && self.pipeline.debug)
    }
}

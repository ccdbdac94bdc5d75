//! Pipeline configuration.
//!
//! The manifest, the invocation options and the CI environment are folded into
//! one immutable [`PipelineConfig`] at startup and handed to every stage.

mod ci;
mod manifest;
mod options;

pub use ci::{CiEnvironment, PublishGate};
pub use manifest::{
    AppSettings, BuildOption, BundleSettings, CiSettings, DEFAULT_MANIFEST, DependencySettings,
    Manifest, PackageDescriptor, PublishSettings,
};
pub use options::{BuildOptionSet, PipelineOptions};

use crate::error::{CliError, PipelineError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a pipeline run needs, resolved once.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    project_root: PathBuf,
    manifest: Manifest,
    options: BuildOptionSet,
    ci: CiEnvironment,
    install_prefix: PathBuf,
    skip_dependencies: bool,
}

impl PipelineConfig {
    /// Validates the options against the manifest and builds the config.
    ///
    /// Relative paths in the manifest are resolved against `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        manifest: Manifest,
        options: BuildOptionSet,
        ci: CiEnvironment,
        install_prefix: impl Into<PathBuf>,
    ) -> Result<Self> {
        let project_root = project_root.into();
        let install_prefix = install_prefix.into();

        for name in &options.enabled {
            if !manifest.has_package_option(name) {
                return Err(CliError::InvalidArguments {
                    reason: format!("no dependency declares an option named `{name}`"),
                }
                .into());
            }
        }

        if options.pipeline.dist {
            if !options.pipeline.app {
                return Err(CliError::ConflictingArguments {
                    arguments: vec!["--with-dist".to_string(), "--without-app".to_string()],
                }
                .into());
            }
            if manifest.bundle.is_none() {
                return Err(PipelineError::Config(
                    "--with-dist requires a [bundle] section".to_string(),
                ));
            }
            if manifest.publish.is_none() {
                return Err(PipelineError::Config(
                    "--with-dist requires a [publish] section".to_string(),
                ));
            }
        }

        let install_prefix = if install_prefix.is_absolute() {
            install_prefix
        } else {
            project_root.join(install_prefix)
        };

        Ok(Self {
            project_root,
            manifest,
            options,
            ci,
            install_prefix,
            skip_dependencies: false,
        })
    }

    /// Skip the dependency resolver (dependencies already installed).
    pub fn with_skip_dependencies(mut self, skip: bool) -> Self {
        self.skip_dependencies = skip;
        self
    }

    /// Project root (directory holding the manifest)
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Parsed manifest
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Resolved options
    pub fn options(&self) -> &BuildOptionSet {
        &self.options
    }

    /// CI environment snapshot
    pub fn ci(&self) -> &CiEnvironment {
        &self.ci
    }

    /// Binary install prefix
    pub fn install_prefix(&self) -> &Path {
        &self.install_prefix
    }

    /// Whether dependency resolution is skipped
    pub fn skip_dependencies(&self) -> bool {
        self.skip_dependencies
    }

    /// Resolve a manifest path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Directory the build command populates
    pub fn build_dir(&self) -> PathBuf {
        self.resolve(&self.manifest.app.build_dir)
    }

    /// Dependency install prefix
    pub fn dependency_prefix(&self) -> PathBuf {
        self.resolve(&self.manifest.dependencies.prefix)
    }

    /// Download cache directory
    pub fn download_cache(&self) -> PathBuf {
        match &self.manifest.dependencies.cache_dir {
            Some(dir) => self.resolve(dir),
            None => dirs::cache_dir()
                .map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("downloads"))
                .unwrap_or_else(|| self.dependency_prefix().join("cache")),
        }
    }

    /// Timeout for external commands
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest.app.command_timeout_secs)
    }
}

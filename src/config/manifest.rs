//! `release.toml` manifest parsing and validation.
//!
//! ```toml
//! [app]
//! name = "starcheat"
//! build_command = ["python3", "build.py", "-v"]
//! entry_point = "starcheat.py"
//!
//! [[dependencies.package]]
//! name = "sip"
//! url = "https://example.org/sip-4.15.4.tar.gz"
//! sha1 = "a5f6342dbb3cdc1fb61440ee8acb805f5fec3c41"
//! build = [["python3", "configure.py", "--bindir={bin}"], ["make"], ["make", "install"]]
//!
//! [bundle]
//! tool = ["python3", "setup.py", "py2app"]
//! output = "dist/starcheat.app"
//! app_name = "StarCheat.app"
//! executable = "Contents/MacOS/starcheat"
//! deploy_tool = "macdeployqt"
//! deploy_args = ["-verbose=2"]
//!
//! [publish]
//! repository = "owner/starcheat"
//! ```

use crate::error::{ErrorExt, PipelineError, Result};
use crate::publish::RetryPolicy;
use crate::stages::Checksum;
use crate::utils::fs;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Default manifest file name looked up in the working directory
pub const DEFAULT_MANIFEST: &str = "release.toml";

/// Complete manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Application build and smoke-test settings
    pub app: AppSettings,

    /// Dependencies installed before the build
    #[serde(default)]
    pub dependencies: DependencySettings,

    /// Application bundle settings; bundling is skipped when absent
    #[serde(default)]
    pub bundle: Option<BundleSettings>,

    /// Release publishing settings; required for `--with-dist`
    #[serde(default)]
    pub publish: Option<PublishSettings>,

    /// Names of the CI environment variables
    #[serde(default)]
    pub ci: CiSettings,
}

/// `[app]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSettings {
    /// Application name, used for the symlink, archive and release names
    pub name: String,

    /// Project build entry point, run from the project root
    pub build_command: Vec<String>,

    /// Directory the build command populates, relative to the project root
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Executable inside the build directory
    pub entry_point: String,

    /// Flag that makes the application print its version and exit
    #[serde(default = "default_version_flag")]
    pub version_flag: String,

    /// Upper bound for any single external command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

/// `[dependencies]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencySettings {
    /// Install prefix for dependencies, relative to the project root
    #[serde(default = "default_deps_prefix")]
    pub prefix: PathBuf,

    /// Download cache; defaults to the user cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Packages, installed in declaration order
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageDescriptor>,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            prefix: default_deps_prefix(),
            cache_dir: None,
            packages: Vec::new(),
        }
    }
}

/// One pinned dependency
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDescriptor {
    /// Package name
    pub name: String,

    /// Source tarball URL
    pub url: String,

    /// Version tag or branch
    #[serde(default)]
    pub version: Option<String>,

    /// SHA-256 of the tarball
    #[serde(default)]
    pub sha256: Option<String>,

    /// SHA-1 of the tarball (older descriptors)
    #[serde(default)]
    pub sha1: Option<String>,

    /// Build steps run inside the unpacked source
    #[serde(default)]
    pub build: Vec<Vec<String>>,

    /// Named boolean options
    #[serde(default)]
    pub options: BTreeMap<String, BuildOption>,
}

impl PackageDescriptor {
    /// Pinned checksum. Validation guarantees exactly one is set.
    pub fn checksum(&self) -> Result<Checksum> {
        match (&self.sha256, &self.sha1) {
            (Some(digest), None) => Ok(Checksum::Sha256(digest.to_ascii_lowercase())),
            (None, Some(digest)) => Ok(Checksum::Sha1(digest.to_ascii_lowercase())),
            _ => Err(PipelineError::Config(format!(
                "package `{}` must pin exactly one of sha256 or sha1",
                self.name
            ))),
        }
    }

    /// Version label used for receipts and `{version}` substitution.
    pub fn version_label(&self) -> &str {
        self.version.as_deref().unwrap_or("latest")
    }
}

/// Boolean package option, e.g. `debug` appending `--debug` to configure
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildOption {
    /// Human-readable description shown by `--list-options`
    pub description: String,

    /// Arguments appended to the target build step when enabled
    #[serde(default)]
    pub args: Vec<String>,

    /// Index of the build step receiving `args`
    #[serde(default)]
    pub step: usize,

    /// Enabled without being requested
    #[serde(default)]
    pub default: bool,
}

/// `[bundle]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleSettings {
    /// Bundling tool, run inside the build directory
    pub tool: Vec<String>,

    /// Bundle produced by the tool, relative to the build directory
    pub output: PathBuf,

    /// Final bundle name inside the build directory
    pub app_name: String,

    /// Executable path inside the bundle
    pub executable: PathBuf,

    /// Deployment tool run on the produced bundle
    #[serde(default)]
    pub deploy_tool: Option<String>,

    /// Extra deploy tool arguments
    #[serde(default)]
    pub deploy_args: Vec<String>,

    /// Trees made user-writable before bundling
    #[serde(default)]
    pub writable_paths: Vec<PathBuf>,

    /// Stale intermediates removed before bundling, relative to the build directory
    #[serde(default)]
    pub clean: Vec<PathBuf>,

    /// Files copied from the project root into the build directory
    #[serde(default)]
    pub stage_files: Vec<PathBuf>,
}

/// `[publish]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishSettings {
    /// REST API root
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// `owner/name` of the hosting repository
    pub repository: String,

    /// Mark created releases as prereleases
    #[serde(default = "default_true")]
    pub prerelease: bool,

    /// Platform suffix appended to the archive name (e.g. `osx`)
    #[serde(default)]
    pub asset_suffix: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Retry budget for both requests
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// `[ci]` section: environment variable names
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CiSettings {
    /// Branch or tag being built
    pub branch_var: String,
    /// Build identifier; publishing requires it
    pub build_id_var: String,
    /// Full commit SHA
    pub commit_var: String,
    /// Set to `false` when secrets are not exposed to the build
    pub secure_env_var: String,
    /// Release API token
    pub token_var: String,
}

impl Default for CiSettings {
    fn default() -> Self {
        Self {
            branch_var: "TRAVIS_BRANCH".to_string(),
            build_id_var: "TRAVIS_BUILD_ID".to_string(),
            commit_var: "TRAVIS_COMMIT".to_string(),
            secure_env_var: "TRAVIS_SECURE_ENV_VARS".to_string(),
            token_var: "HOMEBREW_GITHUB_API_TOKEN".to_string(),
        }
    }
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_version_flag() -> String {
    "-v".to_string()
}

fn default_command_timeout() -> u64 {
    3600
}

fn default_deps_prefix() -> PathBuf {
    PathBuf::from(".deps")
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_http_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Manifest {
    /// Read, parse and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).fs_context("reading manifest", path)?;
        let manifest = Self::parse(&contents)?;
        log::debug!(
            "Loaded manifest {} ({} dependencies)",
            path.display(),
            manifest.dependencies.packages.len()
        );
        Ok(manifest)
    }

    /// Parse and validate manifest text.
    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(contents)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let app = &self.app;
        if app.name.trim().is_empty() {
            return Err(config_error("[app].name cannot be empty"));
        }
        if app.build_command.is_empty() {
            return Err(config_error("[app].build_command cannot be empty"));
        }
        if app.entry_point.trim().is_empty() {
            return Err(config_error("[app].entry_point cannot be empty"));
        }
        if app.command_timeout_secs == 0 {
            return Err(config_error("[app].command_timeout_secs must be positive"));
        }

        let mut seen = HashSet::new();
        for package in &self.dependencies.packages {
            if package.name.trim().is_empty() {
                return Err(config_error("dependency name cannot be empty"));
            }
            if !seen.insert(package.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "dependency `{}` is declared twice",
                    package.name
                )));
            }
            package.checksum()?.validate_format(&package.name)?;
            if package.build.iter().any(Vec::is_empty) {
                return Err(PipelineError::Config(format!(
                    "package `{}` has an empty build step",
                    package.name
                )));
            }
            for (option_name, option) in &package.options {
                if !option.args.is_empty() && option.step >= package.build.len() {
                    return Err(PipelineError::Config(format!(
                        "option `{option_name}` of `{}` targets build step {} but only {} exist",
                        package.name,
                        option.step,
                        package.build.len()
                    )));
                }
            }
        }

        if let Some(bundle) = &self.bundle {
            if bundle.tool.is_empty() {
                return Err(config_error("[bundle].tool cannot be empty"));
            }
            if bundle.app_name.trim().is_empty() {
                return Err(config_error("[bundle].app_name cannot be empty"));
            }
            let deleted = [
                ("output", bundle.output.as_path()),
                ("app_name", Path::new(&bundle.app_name)),
            ]
            .into_iter()
            .chain(bundle.clean.iter().map(|p| ("clean", p.as_path())));
            for (key, path) in deleted {
                if !fs::is_inside_relative(path) {
                    return Err(PipelineError::Config(format!(
                        "[bundle].{key} must name a path inside the build directory, got `{}`",
                        path.display()
                    )));
                }
            }
        }

        if let Some(publish) = &self.publish {
            let mut parts = publish.repository.split('/');
            let valid = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
            );
            if !valid {
                return Err(PipelineError::Config(format!(
                    "[publish].repository must be `owner/name`, got `{}`",
                    publish.repository
                )));
            }
            if publish.timeout_secs == 0 {
                return Err(config_error("[publish].timeout_secs must be positive"));
            }
        }

        Ok(())
    }

    /// Find a package option by name across all dependencies.
    pub fn has_package_option(&self, option: &str) -> bool {
        self.dependencies
            .packages
            .iter()
            .any(|p| p.options.contains_key(option))
    }
}

fn config_error(message: &str) -> PipelineError {
    PipelineError::Config(message.to_string())
}

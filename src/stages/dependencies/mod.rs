//! Dependency resolution: fetch, verify, unpack and build pinned packages.
//!
//! Packages are installed strictly in declaration order under one prefix, so
//! later packages can find the tools earlier ones installed (`{prefix}/bin` is
//! prepended to `PATH` for every build step). The first failure aborts the
//! whole run; nothing is rolled back.

mod checksum;
mod fetch;
mod receipt;

pub use checksum::{Checksum, sha256_file};
pub use fetch::{Fetch, HttpFetcher};
pub use receipt::InstallReceipt;

use crate::config::{BuildOptionSet, PackageDescriptor};
use crate::error::{ErrorExt, PipelineError, Result};
use crate::runner::{CommandSpec, Runner};
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};

/// What happened to one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// Built and installed during this run
    Installed,
    /// Matching receipt found; nothing done
    AlreadyInstalled,
}

/// Result for one dependency.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    /// Package name
    pub name: String,
    /// Version label
    pub version: String,
    /// Outcome
    pub status: ResolutionStatus,
}

/// Installs packages into a dependency prefix.
pub struct DependencyResolver<'a, R, F> {
    runner: &'a R,
    fetcher: &'a F,
    options: &'a BuildOptionSet,
    prefix: PathBuf,
    cache_dir: PathBuf,
}

impl<'a, R: Runner, F: Fetch> DependencyResolver<'a, R, F> {
    /// Creates a resolver installing under `prefix` and caching downloads in `cache_dir`.
    pub fn new(
        runner: &'a R,
        fetcher: &'a F,
        options: &'a BuildOptionSet,
        prefix: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            fetcher,
            options,
            prefix: prefix.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Install every package in order, stopping at the first failure.
    pub async fn resolve_all(
        &self,
        packages: &[PackageDescriptor],
    ) -> Result<Vec<ResolvedDependency>> {
        let mut resolved = Vec::with_capacity(packages.len());
        for package in packages {
            let outcome = self.resolve(package).await.map_err(|e| match e {
                e @ (PipelineError::ChecksumMismatch { .. }
                | PipelineError::Dependency { .. }) => e,
                other => PipelineError::Dependency {
                    name: package.name.clone(),
                    reason: other.to_string(),
                },
            })?;
            resolved.push(outcome);
        }
        Ok(resolved)
    }

    /// Install one package.
    pub async fn resolve(&self, package: &PackageDescriptor) -> Result<ResolvedDependency> {
        let checksum = package.checksum()?;
        let options = self.enabled_options(package);
        let receipt_path = InstallReceipt::path(&self.prefix, &package.name);

        if let Some(receipt) = InstallReceipt::load(&receipt_path).await
            && receipt.matches(&checksum.to_string(), &options)
        {
            log::info!(
                "{} {} already installed, skipping",
                package.name,
                package.version_label()
            );
            return Ok(ResolvedDependency {
                name: package.name.clone(),
                version: package.version_label().to_string(),
                status: ResolutionStatus::AlreadyInstalled,
            });
        }

        log::info!("Installing {} {}", package.name, package.version_label());
        let source = self.fetch_verified(package, &checksum).await?;

        let staging_root = self.prefix.join("tmp");
        tokio::fs::create_dir_all(&staging_root)
            .await
            .fs_context("creating staging directory", &staging_root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}-", package.name))
            .tempdir_in(&staging_root)
            .fs_context("creating staging directory", &staging_root)?;

        let source_dir = unpack(source, staging.path().to_path_buf()).await?;

        for step in self.build_steps(package, &source_dir) {
            let result = self.runner.run(&step).await?;
            if !result.success() {
                return Err(PipelineError::Dependency {
                    name: package.name.clone(),
                    reason: format!(
                        "`{}` {}\n{}",
                        step,
                        result.status_description(),
                        result.combined_output()
                    ),
                });
            }
        }

        InstallReceipt {
            name: package.name.clone(),
            version: package.version_label().to_string(),
            checksum: checksum.to_string(),
            options,
            installed_at: chrono::Utc::now(),
        }
        .write(&receipt_path)
        .await?;

        Ok(ResolvedDependency {
            name: package.name.clone(),
            version: package.version_label().to_string(),
            status: ResolutionStatus::Installed,
        })
    }

    /// Build steps with placeholders substituted and enabled option args appended.
    pub fn build_steps(&self, package: &PackageDescriptor, source_dir: &Path) -> Vec<CommandSpec> {
        let vars = self.placeholders(package);
        let path_env = self.search_path();

        let mut steps: Vec<Vec<String>> = package
            .build
            .iter()
            .map(|argv| argv.iter().map(|arg| substitute(arg, &vars)).collect())
            .collect();

        for (name, option) in &package.options {
            if self.options.package_option_enabled(name, option)
                && let Some(step) = steps.get_mut(option.step)
            {
                step.extend(option.args.iter().map(|arg| substitute(arg, &vars)));
            }
        }

        steps
            .iter()
            .filter_map(|argv| CommandSpec::from_argv(argv))
            .map(|spec| {
                let spec = spec.current_dir(source_dir);
                match &path_env {
                    Some(path) => spec.env("PATH", path.clone()),
                    None => spec,
                }
            })
            .collect()
    }

    fn enabled_options(&self, package: &PackageDescriptor) -> Vec<String> {
        package
            .options
            .iter()
            .filter(|(name, option)| self.options.package_option_enabled(name, option))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn placeholders(&self, package: &PackageDescriptor) -> Vec<(&'static str, String)> {
        let prefix = &self.prefix;
        let show = |p: PathBuf| p.display().to_string();
        vec![
            ("{prefix}", show(prefix.clone())),
            ("{bin}", show(prefix.join("bin"))),
            ("{lib}", show(prefix.join("lib"))),
            ("{include}", show(prefix.join("include"))),
            ("{share}", show(prefix.join("share"))),
            ("{opt}", show(prefix.join("opt").join(&package.name))),
            ("{name}", package.name.clone()),
            ("{version}", package.version_label().to_string()),
        ]
    }

    fn search_path(&self) -> Option<String> {
        let mut paths = vec![self.prefix.join("bin")];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(paths)
            .ok()
            .map(|joined| joined.to_string_lossy().into_owned())
    }

    async fn fetch_verified(
        &self,
        package: &PackageDescriptor,
        checksum: &Checksum,
    ) -> Result<Vec<u8>> {
        let cached = self.cache_path(package, checksum);

        if let Ok(bytes) = tokio::fs::read(&cached).await {
            if checksum.verify(&package.name, &bytes).is_ok() {
                log::debug!("Using cached source {}", cached.display());
                return Ok(bytes);
            }
            log::warn!("Discarding corrupt cached source {}", cached.display());
        }

        let bytes = self.fetcher.fetch(&package.url).await?;
        checksum.verify(&package.name, &bytes)?;

        if let Err(e) = store(&cached, &bytes).await {
            log::warn!("Cannot cache {}: {}", cached.display(), e);
        }

        Ok(bytes)
    }

    fn cache_path(&self, package: &PackageDescriptor, checksum: &Checksum) -> PathBuf {
        let file_name = package
            .url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("source.tar.gz");
        self.cache_dir.join(format!(
            "{}-{}-{}",
            checksum.algorithm(),
            checksum.expected(),
            file_name
        ))
    }
}

async fn store(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

fn substitute(arg: &str, vars: &[(&'static str, String)]) -> String {
    vars.iter()
        .fold(arg.to_string(), |acc, (key, value)| acc.replace(key, value))
}

/// Unpack a gzip tarball into `staging` and return the source root.
///
/// Release tarballs usually wrap everything in one top-level directory; that
/// directory is the source root when present.
async fn unpack(source: Vec<u8>, staging: PathBuf) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        let mut archive = tar::Archive::new(GzDecoder::new(source.as_slice()));
        archive
            .unpack(&staging)
            .fs_context("unpacking source archive", &staging)?;

        let mut entries = std::fs::read_dir(&staging)
            .fs_context("reading unpacked source", &staging)?
            .collect::<std::io::Result<Vec<_>>>()
            .fs_context("reading unpacked source", &staging)?;

        if entries.len() == 1 && entries[0].path().is_dir() {
            return Ok(entries.remove(0).path());
        }
        Ok(staging)
    })
    .await
    .map_err(|e| PipelineError::Generic(format!("Unpack task panicked: {e}")))?
}

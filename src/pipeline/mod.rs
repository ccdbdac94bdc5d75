//! Pipeline orchestration.
//!
//! # Overview
//!
//! [`Pipeline::run`] executes the stages strictly in order and stops at the
//! first failure:
//!
//! 1. Resolve dependencies
//! 2. Build
//! 3. Smoke test the build output
//! 4. Install the binary (unless `--without-binary`)
//! 5. Bundle the application (unless `--without-app`)
//! 6. Archive the bundle (`--with-dist`)
//! 7. Publish the archive (`--with-dist`, CI credentials present)
//!
//! The run holds an [`OutputLock`] on the project root for its whole duration.

mod report;

pub use report::{PipelineReport, Stage, StageOutcome, StageStatus};

use crate::config::{PipelineConfig, PublishGate};
use crate::error::{PipelineError, Result};
use crate::lock::OutputLock;
use crate::publish::{ReleasePublisher, ReleaseRecord};
use crate::runner::{ProcessRunner, Runner};
use crate::stages::{
    DependencyResolver, Fetch, HttpFetcher, ResolutionStatus, archive_name, create_archive,
    create_bundle, install_binary, run_build, smoke_test,
};
use std::time::Duration;

/// Download timeout for dependency sources
const FETCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Main pipeline orchestrator.
pub struct Pipeline<R, F> {
    config: PipelineConfig,
    runner: R,
    fetcher: F,
}

impl Pipeline<ProcessRunner, HttpFetcher> {
    /// Pipeline that spawns real processes and downloads over HTTP.
    pub fn with_system_tools(config: PipelineConfig, echo_output: bool) -> Result<Self> {
        let runner = ProcessRunner::new(config.command_timeout()).echo_output(echo_output);
        let fetcher = HttpFetcher::new(FETCH_TIMEOUT)?;
        Ok(Self::new(config, runner, fetcher))
    }
}

impl<R: Runner, F: Fetch> Pipeline<R, F> {
    /// Creates a pipeline with explicit runner and fetcher capabilities.
    pub fn new(config: PipelineConfig, runner: R, fetcher: F) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    /// Configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every enabled stage in order.
    pub async fn run(&self) -> Result<PipelineReport> {
        let lock = OutputLock::acquire(self.config.project_root())?;
        log::debug!("Holding {}", lock.path().display());

        let mut report = PipelineReport::default();
        let options = self.config.options().pipeline;
        let manifest = self.config.manifest();
        let app = &manifest.app;

        self.resolve_dependencies(&mut report).await?;

        let build_dir = run_build(&self.runner, &self.config).await?;
        report.complete(Stage::Build, build_dir.display().to_string());

        let entry_point = build_dir.join(&app.entry_point);
        let version =
            smoke_test(&self.runner, &entry_point, &app.version_flag, Some(&build_dir)).await?;
        report.complete(Stage::SmokeTest, first_line(&version));

        if options.binary {
            let installed = install_binary(
                &build_dir,
                self.config.install_prefix(),
                &app.name,
                &app.entry_point,
            )
            .await?;
            smoke_test(&self.runner, &installed.command, &app.version_flag, None).await?;
            report.complete(Stage::Install, installed.command.display().to_string());
            report.installed = Some(installed);
        } else {
            report.skip(Stage::Install, "--without-binary");
        }

        match (&manifest.bundle, options.app) {
            (_, false) => report.skip(Stage::Bundle, "--without-app"),
            (None, true) => report.skip(Stage::Bundle, "no [bundle] section in manifest"),
            (Some(settings), true) => {
                let bundle = create_bundle(&self.runner, &self.config, settings).await?;
                report.complete(Stage::Bundle, bundle.path.display().to_string());
                report.bundle = Some(bundle);
            }
        }

        if !options.dist {
            report.skip(Stage::Archive, "--with-dist not set");
            report.skip(Stage::Publish, "--with-dist not set");
            return Ok(report);
        }

        self.archive_and_publish(&mut report).await?;
        Ok(report)
    }

    async fn resolve_dependencies(&self, report: &mut PipelineReport) -> Result<()> {
        let packages = &self.config.manifest().dependencies.packages;
        if self.config.skip_dependencies() {
            report.skip(Stage::Dependencies, "--skip-deps");
            return Ok(());
        }
        if packages.is_empty() {
            report.skip(Stage::Dependencies, "no dependencies declared");
            return Ok(());
        }

        let resolver = DependencyResolver::new(
            &self.runner,
            &self.fetcher,
            self.config.options(),
            self.config.dependency_prefix(),
            self.config.download_cache(),
        );
        let resolved = resolver.resolve_all(packages).await?;
        let fresh = resolved
            .iter()
            .filter(|d| d.status == ResolutionStatus::Installed)
            .count();
        report.complete(
            Stage::Dependencies,
            format!("{fresh} installed, {} up to date", resolved.len() - fresh),
        );
        Ok(())
    }

    async fn archive_and_publish(&self, report: &mut PipelineReport) -> Result<()> {
        let manifest = self.config.manifest();
        let (Some(bundle), Some(publish)) = (&report.bundle, &manifest.publish) else {
            return Err(PipelineError::Config(
                "--with-dist requires a bundle and a [publish] section".to_string(),
            ));
        };

        let gate = self.config.ci().publish_gate();
        let commit = match &gate {
            PublishGate::Ready { commit, .. } => Some(commit.as_str()),
            PublishGate::Skipped(_) => self.config.ci().commit.as_deref(),
        };
        let file_name = archive_name(&manifest.app.name, commit, publish.asset_suffix.as_deref());
        let archive = create_archive(&bundle.path, &self.config.build_dir(), &file_name).await?;
        report.complete(Stage::Archive, archive.path.display().to_string());

        match gate {
            PublishGate::Skipped(reason) => report.skip(Stage::Publish, reason),
            PublishGate::Ready { commit, token } => {
                let publisher = ReleasePublisher::new(publish, token)?;
                let record =
                    ReleaseRecord::for_commit(&manifest.app.name, &commit, publish.prerelease);
                let release = publisher.publish(&record, &archive).await?;
                report.complete(
                    Stage::Publish,
                    release
                        .html_url
                        .clone()
                        .unwrap_or_else(|| format!("release {}", release.tag)),
                );
                report.release = Some(release);
            }
        }

        report.archive = Some(archive);
        Ok(())
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

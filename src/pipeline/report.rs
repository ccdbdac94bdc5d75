//! Per-stage outcomes of a pipeline run.

use crate::publish::PublishedRelease;
use crate::stages::{AppBundle, ArchiveArtifact, InstalledBinary};
use std::fmt;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Dependency resolver
    Dependencies,
    /// Project build
    Build,
    /// Version-flag smoke test of the build output
    SmokeTest,
    /// Binary install into the prefix
    Install,
    /// Application bundle
    Bundle,
    /// Gzip tarball of the bundle
    Archive,
    /// Release creation and asset upload
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dependencies => "dependencies",
            Self::Build => "build",
            Self::SmokeTest => "smoke test",
            Self::Install => "install",
            Self::Bundle => "bundle",
            Self::Archive => "archive",
            Self::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Ran successfully, with a short summary
    Completed(String),
    /// Did not run, with the reason
    Skipped(String),
}

/// One stage's outcome.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Stage
    pub stage: Stage,
    /// Outcome
    pub status: StageStatus,
}

/// Everything a successful run produced.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Outcomes in execution order
    pub outcomes: Vec<StageOutcome>,
    /// Installed command, if the install stage ran
    pub installed: Option<InstalledBinary>,
    /// Application bundle, if the bundle stage ran
    pub bundle: Option<AppBundle>,
    /// Archive, if the archive stage ran
    pub archive: Option<ArchiveArtifact>,
    /// Published release, if the publish stage ran
    pub release: Option<PublishedRelease>,
}

impl PipelineReport {
    pub(crate) fn complete(&mut self, stage: Stage, summary: impl Into<String>) {
        self.outcomes.push(StageOutcome {
            stage,
            status: StageStatus::Completed(summary.into()),
        });
    }

    pub(crate) fn skip(&mut self, stage: Stage, reason: impl Into<String>) {
        let reason = reason.into();
        log::info!("Skipping {}: {}", stage, reason);
        self.outcomes.push(StageOutcome {
            stage,
            status: StageStatus::Skipped(reason),
        });
    }

    /// Outcome of `stage`, if it was reached
    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.outcomes
            .iter()
            .find(|o| o.stage == stage)
            .map(|o| &o.status)
    }

    /// Whether `stage` ran to completion
    pub fn completed(&self, stage: Stage) -> bool {
        matches!(self.status(stage), Some(StageStatus::Completed(_)))
    }

    /// Whether `stage` was skipped
    pub fn skipped(&self, stage: Stage) -> bool {
        matches!(self.status(stage), Some(StageStatus::Skipped(_)))
    }
}

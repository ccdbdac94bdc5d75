//! Error types for pipeline operations.
//!
//! Every stage failure maps onto one [`PipelineError`] variant with an
//! actionable message, a recovery hint and a distinct process exit code.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use crate::publish::PublishError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for all pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Manifest or option validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO errors with the path and action that caused them
    #[error("failed {context} ({}): {source}", path.display())]
    Fs {
        /// What was being done
        context: String,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A dependency could not be fetched, unpacked or built
    #[error("Dependency `{name}` failed: {reason}")]
    Dependency {
        /// Package name
        name: String,
        /// Reason for the error
        reason: String,
    },

    /// Downloaded source does not match the pinned checksum
    #[error("Checksum mismatch for `{name}`: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Package name
        name: String,
        /// Pinned checksum
        expected: String,
        /// Computed checksum
        actual: String,
    },

    /// Project build command failed or produced nothing
    #[error("Build failed: `{command}` {status}\n{output}")]
    Build {
        /// Command line that was run
        command: String,
        /// Exit status description
        status: String,
        /// Captured output
        output: String,
    },

    /// Built application did not start
    #[error("Smoke test failed: `{command}` {status}\n{output}")]
    SmokeTest {
        /// Command line that was run
        command: String,
        /// Exit status description
        status: String,
        /// Captured output
        output: String,
    },

    /// Binary install into the prefix failed
    #[error("Install failed: {0}")]
    Install(String),

    /// Application bundle creation failed
    #[error("Bundling failed during {step}: {reason}")]
    Bundle {
        /// Bundling step (prepare, clean, stage, bundle, deploy, rename, verify)
        step: &'static str,
        /// Reason for the error
        reason: String,
    },

    /// Archive creation failed
    #[error("Archive failed: {0}")]
    Archive(String),

    /// Release creation or asset upload failed
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    /// Another pipeline instance holds the output lock
    #[error("Output tree is locked by another pipeline run ({})", path.display())]
    Locked {
        /// Lock file path
        path: PathBuf,
    },

    /// External process could not be spawned or timed out
    #[error("Command `{command}` could not run: {reason}")]
    Process {
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Plain message
    #[error("{0}")]
    Generic(String),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Conflicting arguments
    #[error("Conflicting arguments: {arguments:?}")]
    ConflictingArguments {
        /// Arguments that conflict
        arguments: Vec<String>,
    },
}

impl PipelineError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            Self::Cli(_) | Self::Config(_) | Self::Toml(_) => vec![
                "Check release.toml against the documented sections".to_string(),
                "Run with --help to see the available switches".to_string(),
            ],
            Self::Dependency { name, .. } => vec![
                format!("Check that the source URL for `{name}` is still reachable"),
                "Re-run with -v to see the full build step output".to_string(),
            ],
            Self::ChecksumMismatch { name, .. } => vec![
                format!(
                    "Upstream source for `{name}` changed; verify it and update the pinned checksum"
                ),
                "Delete the download cache if a partial download was stored".to_string(),
            ],
            Self::Build { .. } => {
                vec!["Run the build command by hand from the project root".to_string()]
            }
            Self::SmokeTest { .. } => vec![
                "The built application failed to print its version".to_string(),
                "Check that runtime dependencies are installed".to_string(),
            ],
            Self::Bundle { step, .. } if *step == "prepare" => vec![
                "Make sure every writable_paths entry exists and is owned by you".to_string(),
            ],
            Self::Bundle { .. } => vec![
                "Remove stale dist/ and build/ directories and re-run".to_string(),
                "Check that the bundling and deploy tools are on PATH".to_string(),
            ],
            Self::Publish(PublishError::TagInUse { tag }) => vec![
                format!("Delete the existing `{tag}` release or push a new commit"),
            ],
            Self::Publish(PublishError::MalformedResponse { .. }) => vec![
                "The release API returned an unexpected body; check api_base".to_string(),
            ],
            Self::Publish(_) => vec![
                "Check network access and that the token can create releases".to_string(),
            ],
            Self::Locked { path } => vec![format!(
                "Wait for the other run to finish, or remove {} if it crashed",
                path.display()
            )],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Exit code reported to the invoking shell
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cli(_) | Self::Config(_) | Self::Toml(_) => 2,
            Self::Dependency { .. } | Self::ChecksumMismatch { .. } => 10,
            Self::Build { .. } => 11,
            Self::SmokeTest { .. } => 12,
            Self::Install(_) => 13,
            Self::Bundle { .. } => 14,
            Self::Archive(_) => 15,
            Self::Publish(_) => 16,
            Self::Locked { .. } => 17,
            _ => 1,
        }
    }
}

/// Attach path context to IO results.
pub trait ErrorExt<T> {
    /// Wrap an IO error with the action being performed and the path involved.
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| PipelineError::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Return early with a [`PipelineError::Generic`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::PipelineError::Generic(format!($($arg)*)))
    };
}

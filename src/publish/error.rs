//! Publish-stage errors.

use thiserror::Error;

/// Errors raised while creating a release or uploading its asset.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Transport failure (connect, timeout, reset)
    #[error("network error during {operation}: {source}")]
    Network {
        /// Which request failed
        operation: &'static str,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The release tag already exists on the remote
    #[error("release tag `{tag}` is already in use")]
    TagInUse {
        /// Tag that collided
        tag: String,
    },

    /// The release API answered with a body we cannot use
    #[error("malformed release response: {reason}")]
    MalformedResponse {
        /// What was wrong with the body
        reason: String,
    },

    /// The server rejected the request
    #[error("{operation} rejected with HTTP {status}: {body}")]
    Rejected {
        /// Which request failed
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Client setup or request construction failed
    #[error("invalid publish configuration: {0}")]
    Setup(String),

    /// Archive could not be read for upload
    #[error("cannot read archive {path}: {source}")]
    Archive {
        /// Archive path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

//! Release publishing over the hosted releases REST API.
//!
//! Publishing is two requests: create a release from a [`ReleaseRecord`], then
//! upload the archive to the asset endpoint named in the response. Both
//! requests carry a bearer token, run under a client timeout and are retried
//! with [`RetryPolicy`] on transient failures.

mod client;
mod error;
mod release;
mod retry;

pub use client::{PublishedRelease, ReleasePublisher, UploadedAsset};
pub use error::PublishError;
pub use release::{
    CreatedRelease, ReleaseRecord, ReleaseResponse, SHORT_COMMIT_LEN, asset_upload_url,
    expand_upload_template, short_commit,
};
pub use retry::{RetryPolicy, with_retry};

//! Release API client: create a release, then upload the archive to it.

use super::release::{
    CreatedRelease, ReleaseRecord, ReleaseResponse, ValidationFailure, asset_upload_url,
};
use super::retry::{RetryPolicy, with_retry};
use super::PublishError;
use crate::config::PublishSettings;
use crate::stages::ArchiveArtifact;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const ACCEPT_JSON: &str = "application/vnd.github+json";
const MAX_BODY_IN_ERROR: usize = 512;

/// Asset metadata returned by a successful upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadedAsset {
    /// Asset name as stored by the server
    #[serde(default)]
    pub name: Option<String>,
    /// Public download link
    #[serde(default)]
    pub browser_download_url: Option<String>,
}

/// Outcome of a full publish.
#[derive(Debug, Clone)]
pub struct PublishedRelease {
    /// Tag that was created
    pub tag: String,
    /// Release page, when reported
    pub html_url: Option<String>,
    /// Uploaded asset
    pub asset: UploadedAsset,
}

/// Client for the hosted releases API.
pub struct ReleasePublisher {
    client: reqwest::Client,
    releases_url: Url,
    token: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ReleasePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasePublisher")
            .field("releases_url", &self.releases_url.as_str())
            .field("token", &"<redacted>")
            .field("retry", &self.retry)
            .finish()
    }
}

impl ReleasePublisher {
    /// Creates a publisher for `settings.repository` authenticated with `token`.
    pub fn new(settings: &PublishSettings, token: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PublishError::Setup(format!("HTTP client: {e}")))?;

        let mut api_base = settings.api_base.clone();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        let releases_url = Url::parse(&api_base)
            .and_then(|base| base.join(&format!("repos/{}/releases", settings.repository)))
            .map_err(|e| PublishError::Setup(format!("api_base `{}`: {e}", settings.api_base)))?;

        Ok(Self {
            client,
            releases_url,
            token: token.into(),
            retry: settings.retry.clone(),
        })
    }

    /// Create the release, then upload `archive` to it.
    pub async fn publish(
        &self,
        record: &ReleaseRecord,
        archive: &ArchiveArtifact,
    ) -> Result<PublishedRelease, PublishError> {
        let release = self.create_release(record).await?;
        log::info!(
            "Created release {} ({})",
            record.tag_name,
            release.html_url.as_deref().unwrap_or("no html_url")
        );

        let asset = self.upload_asset(&release, archive).await?;

        Ok(PublishedRelease {
            tag: record.tag_name.clone(),
            html_url: release.html_url,
            asset,
        })
    }

    /// POST the release record and decode the upload endpoint from the response.
    pub async fn create_release(
        &self,
        record: &ReleaseRecord,
    ) -> Result<CreatedRelease, PublishError> {
        with_retry(&self.retry, "create release", || self.try_create_release(record)).await
    }

    /// POST the archive bytes to the release's asset endpoint.
    pub async fn upload_asset(
        &self,
        release: &CreatedRelease,
        archive: &ArchiveArtifact,
    ) -> Result<UploadedAsset, PublishError> {
        let content = tokio::fs::read(&archive.path)
            .await
            .map_err(|source| PublishError::Archive {
                path: archive.path.display().to_string(),
                source,
            })?;
        let content = Bytes::from(content);
        let url = asset_upload_url(&release.upload_base, &archive.file_name);

        log::info!("Uploading {} ({} bytes)", archive.file_name, content.len());
        with_retry(&self.retry, "upload asset", || {
            self.try_upload(&url, content.clone())
        })
        .await
    }

    async fn try_create_release(
        &self,
        record: &ReleaseRecord,
    ) -> Result<CreatedRelease, PublishError> {
        const OPERATION: &str = "create release";

        let response = self
            .client
            .post(self.releases_url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, ACCEPT_JSON)
            .json(record)
            .send()
            .await
            .map_err(|source| PublishError::Network {
                operation: OPERATION,
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| PublishError::Network {
                operation: OPERATION,
                source,
            })?;

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let failure: ValidationFailure = serde_json::from_str(&body).unwrap_or_default();
            if failure.is_tag_taken() {
                return Err(PublishError::TagInUse {
                    tag: record.tag_name.clone(),
                });
            }
            return Err(PublishError::Rejected {
                operation: OPERATION,
                status: status.as_u16(),
                body: failure.message.unwrap_or_else(|| truncate(&body)),
            });
        }

        if !status.is_success() {
            return Err(PublishError::Rejected {
                operation: OPERATION,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        let parsed: ReleaseResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::MalformedResponse {
                reason: format!("release response is not valid JSON: {e}"),
            })?;

        CreatedRelease::try_from(parsed)
    }

    async fn try_upload(&self, url: &Url, content: Bytes) -> Result<UploadedAsset, PublishError> {
        const OPERATION: &str = "upload asset";

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, ACCEPT_JSON)
            .header(CONTENT_TYPE, "application/gzip")
            .body(content)
            .send()
            .await
            .map_err(|source| PublishError::Network {
                operation: OPERATION,
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| PublishError::Network {
                operation: OPERATION,
                source,
            })?;

        if !status.is_success() {
            return Err(PublishError::Rejected {
                operation: OPERATION,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_IN_ERROR) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

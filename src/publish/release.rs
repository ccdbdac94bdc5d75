//! Release record, API response types and upload URL handling.

use super::PublishError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Number of commit characters used in tags, display names and archive names.
pub const SHORT_COMMIT_LEN: usize = 7;

/// Abbreviate a commit SHA to [`SHORT_COMMIT_LEN`] characters.
///
/// Shorter input is returned unchanged.
pub fn short_commit(commit: &str) -> &str {
    match commit.char_indices().nth(SHORT_COMMIT_LEN) {
        Some((idx, _)) => &commit[..idx],
        None => commit,
    }
}

/// Body of the create-release request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRecord {
    /// Tag to create (short commit)
    pub tag_name: String,
    /// Full commit the tag points at
    pub target_commitish: String,
    /// Display name
    pub name: String,
    /// Whether the release is flagged as a prerelease
    pub prerelease: bool,
}

impl ReleaseRecord {
    /// Build the record for an application at a given commit.
    pub fn for_commit(app_name: &str, commit: &str, prerelease: bool) -> Self {
        let short = short_commit(commit);
        Self {
            tag_name: short.to_string(),
            target_commitish: commit.to_string(),
            name: format!("{app_name} ({short})"),
            prerelease,
        }
    }
}

/// Fields we read from the create-release response.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseResponse {
    /// Release id
    #[serde(default)]
    pub id: Option<u64>,
    /// Browser URL for the release page
    #[serde(default)]
    pub html_url: Option<String>,
    /// URI template for asset uploads (`.../assets{?name,label}`)
    #[serde(default)]
    pub upload_url: Option<String>,
}

/// Validation failure body returned with HTTP 422.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ValidationFailure {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ValidationEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ValidationEntry {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

impl ValidationFailure {
    pub(crate) fn is_tag_taken(&self) -> bool {
        self.errors.iter().any(|e| {
            e.code.as_deref() == Some("already_exists")
                && e.field.as_deref().is_none_or(|f| f == "tag_name")
        })
    }
}

/// A release that was created and can accept assets.
#[derive(Debug, Clone)]
pub struct CreatedRelease {
    /// Release id, when reported
    pub id: Option<u64>,
    /// Release page, when reported
    pub html_url: Option<String>,
    /// Asset endpoint with the URI template removed
    pub upload_base: Url,
}

impl TryFrom<ReleaseResponse> for CreatedRelease {
    type Error = PublishError;

    fn try_from(response: ReleaseResponse) -> Result<Self, Self::Error> {
        let template = response
            .upload_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| PublishError::MalformedResponse {
                reason: "release not created: response has no upload_url".to_string(),
            })?;

        Ok(Self {
            id: response.id,
            html_url: response.html_url,
            upload_base: expand_upload_template(&template)?,
        })
    }
}

/// Strip the `{?name,label}` suffix from an upload URL template.
pub fn expand_upload_template(template: &str) -> Result<Url, PublishError> {
    let literal = match template.find('{') {
        Some(idx) => &template[..idx],
        None => template,
    };

    Url::parse(literal).map_err(|e| PublishError::MalformedResponse {
        reason: format!("upload_url `{template}` is not a valid URL: {e}"),
    })
}

/// Upload endpoint for a named asset.
pub fn asset_upload_url(base: &Url, asset_name: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().clear().append_pair("name", asset_name);
    url
}

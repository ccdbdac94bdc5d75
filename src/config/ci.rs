//! CI environment snapshot and the publish gate.

use super::manifest::CiSettings;

/// CI-provided values, read once at pipeline start.
#[derive(Clone, Default)]
pub struct CiEnvironment {
    /// Branch or tag being built
    pub branch: Option<String>,
    /// Build identifier
    pub build_id: Option<String>,
    /// Full commit SHA
    pub commit: Option<String>,
    /// Raw value of the secure-variables flag
    pub secure_env_vars: Option<String>,
    token: Option<String>,
}

impl std::fmt::Debug for CiEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiEnvironment")
            .field("branch", &self.branch)
            .field("build_id", &self.build_id)
            .field("commit", &self.commit)
            .field("secure_env_vars", &self.secure_env_vars)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Whether the publish stage may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishGate {
    /// All credentials present
    Ready {
        /// Commit to tag
        commit: String,
        /// API token
        token: String,
    },
    /// Publishing is skipped; the pipeline still succeeds
    Skipped(String),
}

impl CiEnvironment {
    /// Snapshot the process environment.
    pub fn from_env(settings: &CiSettings) -> Self {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    /// Snapshot values through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(settings: &CiSettings, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            branch: read(&settings.branch_var),
            build_id: read(&settings.build_id_var),
            commit: read(&settings.commit_var),
            secure_env_vars: read(&settings.secure_env_var),
            token: read(&settings.token_var),
        }
    }

    /// Whether a token was provided.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Decide whether publishing can proceed.
    pub fn publish_gate(&self) -> PublishGate {
        if self.build_id.is_none() {
            return PublishGate::Skipped("no CI build id; not running in CI".to_string());
        }
        if self
            .secure_env_vars
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("false"))
        {
            return PublishGate::Skipped(
                "secure environment variables are not available".to_string(),
            );
        }
        let Some(token) = self.token.clone() else {
            return PublishGate::Skipped("no release API token".to_string());
        };
        let Some(commit) = self.commit.clone() else {
            return PublishGate::Skipped("no commit SHA to tag".to_string());
        };

        PublishGate::Ready { commit, token }
    }
}

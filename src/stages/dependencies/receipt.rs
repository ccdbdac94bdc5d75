//! Install receipts recording what was built into the dependency prefix.

use crate::error::{ErrorExt, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

/// Written after a dependency's build steps all succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    /// Package name
    pub name: String,
    /// Version label
    pub version: String,
    /// `algorithm:hex` of the source that was built
    pub checksum: String,
    /// Enabled package options, sorted
    pub options: Vec<String>,
    /// Completion time
    pub installed_at: DateTime<Utc>,
}

impl InstallReceipt {
    /// Receipt location for `name` under `prefix`.
    pub fn path(prefix: &Path, name: &str) -> PathBuf {
        prefix.join("opt").join(name).join(RECEIPT_FILE)
    }

    /// Load an existing receipt; unreadable or corrupt receipts count as absent.
    pub async fn load(path: &Path) -> Option<Self> {
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&contents) {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                log::warn!("Ignoring unreadable receipt {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist the receipt, creating parent directories.
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating receipt directory", parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents)
            .await
            .fs_context("writing install receipt", path)
    }

    /// Same source and same options as a pending install.
    pub fn matches(&self, checksum: &str, options: &[String]) -> bool {
        self.checksum == checksum && self.options == options
    }
}

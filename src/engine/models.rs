use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::state::VerificationStatus;
use crate::error::VerifyError;
use crate::util::canonical_file_name;

/// One file attached to a published release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub tag: String,
    pub display_name: String,
    pub page_url: String,
    pub is_draft: bool,
    pub is_prerelease: bool,
    pub assets: Vec<ReleaseAsset>,
}

/// A binary on the local filesystem believed to be the installed application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocalArtifact {
    pub absolute_path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

impl LocalArtifact {
    pub fn canonical_name(&self) -> String {
        canonical_file_name(&self.file_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumEntry {
    /// File name as written in the published listing.
    pub file_name: String,
    pub sha256: String,
    /// Release asset the entry was harvested from.
    pub source_asset: String,
}

/// Merged checksum entries of one release, keyed by canonical file name.
#[derive(Clone, Debug, Default)]
pub struct ChecksumSet {
    pub entries: BTreeMap<String, ChecksumEntry>,
    /// First asset that yielded at least one entry.
    pub source_asset_name: Option<String>,
}

impl ChecksumSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, canonical_name: &str) -> Option<&ChecksumEntry> {
        self.entries.get(canonical_name)
    }
}

/// Outcome of one verification pass. A new pass produces a new value.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub message: String,
    pub release_tag: Option<String>,
    pub release_page_url: Option<String>,
    pub local_artifact: Option<LocalArtifact>,
    pub expected_hash: Option<String>,
    pub matched_checksum_entry_name: Option<String>,
    pub checksum_source_asset_name: Option<String>,
    pub signature_asset_name: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl VerificationResult {
    pub fn new(status: VerificationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            release_tag: None,
            release_page_url: None,
            local_artifact: None,
            expected_hash: None,
            matched_checksum_entry_name: None,
            checksum_source_asset_name: None,
            signature_asset_name: None,
            checked_at: Utc::now(),
        }
    }

    pub fn from_error(err: &VerifyError) -> Self {
        let message = match err {
            VerifyError::Network(_) | VerifyError::Parse { .. } => {
                format!("Verification failed: {err}")
            }
            _ => capitalize(&err.to_string()),
        };
        Self::new(err.status(), message)
    }

    pub fn with_release(mut self, release: &ReleaseInfo) -> Self {
        self.release_tag = Some(release.tag.clone());
        self.release_page_url = Some(release.page_url.clone()).filter(|url| !url.is_empty());
        self
    }

    /// Computed hash of the local artifact, if one was selected.
    pub fn computed_hash(&self) -> Option<&str> {
        self.local_artifact.as_ref().map(|a| a.sha256.as_str())
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

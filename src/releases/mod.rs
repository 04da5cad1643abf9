use log::{debug, info};
use serde::Deserialize;

use crate::engine::models::{ReleaseAsset, ReleaseInfo};
use crate::error::{VerifyError, VerifyResult};
use crate::util::canonical_file_name;

const SIGNATURE_EXTENSIONS: &[&str] = &[".sig", ".asc", ".minisig"];

/// Release object as returned by the GitHub releases API.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl From<GithubRelease> for ReleaseInfo {
    fn from(release: GithubRelease) -> Self {
        ReleaseInfo {
            tag: release.tag_name,
            display_name: release.name.unwrap_or_default(),
            page_url: release.html_url,
            is_draft: release.draft,
            is_prerelease: release.prerelease,
            assets: release
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                })
                .collect(),
        }
    }
}

/// Parse a release index body into releases, preserving index order.
pub fn parse_release_index(body: &[u8]) -> VerifyResult<Vec<ReleaseInfo>> {
    let releases: Vec<GithubRelease> = serde_json::from_slice(body)
        .map_err(|e| VerifyError::Network(format!("release index parse error: {e}")))?;
    Ok(releases.into_iter().map(ReleaseInfo::from).collect())
}

/// Pick the release to verify against.
///
/// In order: a release whose tag or name equals the running version (with or
/// without a `v` prefix), then the first published non-prerelease, then the
/// first release in index order.
pub fn select_release<'a>(
    releases: &'a [ReleaseInfo],
    running_version: &str,
) -> VerifyResult<&'a ReleaseInfo> {
    let first = releases.first().ok_or(VerifyError::NoReleases)?;

    let wanted = version_candidates(running_version);
    if let Some(exact) = releases.iter().find(|release| {
        wanted
            .iter()
            .any(|v| release.tag.trim() == v || release.display_name.trim() == v)
    }) {
        info!("releases: exact match {} for version {}", exact.tag, running_version);
        return Ok(exact);
    }

    if let Some(stable) = releases
        .iter()
        .find(|release| !release.is_draft && !release.is_prerelease)
    {
        info!(
            "releases: no release for version {:?}; using latest stable {}",
            running_version, stable.tag
        );
        return Ok(stable);
    }

    debug!("releases: no stable release; falling back to {}", first.tag);
    Ok(first)
}

fn version_candidates(running_version: &str) -> Vec<String> {
    let raw = running_version.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    let bare = normalize_version(raw);
    let mut candidates = vec![raw.to_owned()];
    for candidate in [bare.clone(), format!("v{bare}")] {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Bare form of a version: surrounding whitespace and any leading `v`/`V` dropped.
fn normalize_version(version: &str) -> String {
    version.trim().trim_start_matches(['v', 'V']).to_owned()
}

pub fn is_signature_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    SIGNATURE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Locate a detached signature asset. Signatures named after one of
/// `preferred` (e.g. the matched artifact or the checksum listing) win over
/// the first signature asset of the release. The signature is never checked.
pub fn signature_asset<'a>(release: &'a ReleaseInfo, preferred: &[&str]) -> Option<&'a ReleaseAsset> {
    let signatures: Vec<&ReleaseAsset> = release
        .assets
        .iter()
        .filter(|asset| is_signature_name(&asset.name))
        .collect();

    for name in preferred {
        let wanted = canonical_file_name(name);
        if wanted.is_empty() {
            continue;
        }
        let found = signatures.iter().find(|asset| {
            let signed = canonical_file_name(&asset.name);
            SIGNATURE_EXTENSIONS
                .iter()
                .any(|ext| signed.strip_suffix(ext) == Some(wanted.as_str()))
        });
        if let Some(asset) = found {
            return Some(asset);
        }
    }
    signatures.first().copied()
}

use log::{debug, info, warn};

use crate::engine::models::{ChecksumEntry, ChecksumSet, LocalArtifact, ReleaseInfo, VerificationResult};
use crate::engine::state::VerificationStatus;
use crate::error::{VerifyError, VerifyResult};
use crate::releases::signature_asset;
use crate::util::{normalize_hash, sample_names};

const MAX_SAMPLED_NAMES: usize = 3;

/// Decide the verdict for a release once checksums are harvested and local
/// artifacts are hashed.
///
/// `Match` is only reachable through an explicit string comparison against
/// the entry whose canonical name equals the artifact's canonical name.
pub fn verify(
    release: &ReleaseInfo,
    checksums: &ChecksumSet,
    artifacts: &[LocalArtifact],
) -> VerificationResult {
    match pair_artifact(release, checksums, artifacts) {
        Ok((artifact, entry)) => compare(release, checksums, artifact, entry),
        Err(err) => {
            warn!("verify: {err}");
            let mut result = VerificationResult::from_error(&err).with_release(release);
            result.checksum_source_asset_name = checksums.source_asset_name.clone();
            if matches!(err, VerifyError::NoMatchingChecksum { .. }) {
                result.local_artifact = artifacts.first().cloned();
                result.message = format!(
                    "WARNING: {}. The local build cannot be tied to release {}.",
                    result.message, release.tag
                );
            }
            result.signature_asset_name = signature_for(release, checksums, None);
            result
        }
    }
}

/// First artifact, in discovery order, with a checksum entry of the same
/// canonical name.
fn pair_artifact<'a>(
    release: &ReleaseInfo,
    checksums: &'a ChecksumSet,
    artifacts: &'a [LocalArtifact],
) -> VerifyResult<(&'a LocalArtifact, &'a ChecksumEntry)> {
    if checksums.is_empty() {
        return Err(VerifyError::NoChecksums {
            tag: release.tag.clone(),
        });
    }
    if artifacts.is_empty() {
        return Err(VerifyError::NoLocalArtifact);
    }
    artifacts
        .iter()
        .find_map(|artifact| {
            checksums
                .get(&artifact.canonical_name())
                .map(|entry| (artifact, entry))
        })
        .ok_or_else(|| VerifyError::NoMatchingChecksum {
            samples: sample_names(
                artifacts.iter().map(|a| a.file_name.as_str()),
                MAX_SAMPLED_NAMES,
            ),
        })
}

fn compare(
    release: &ReleaseInfo,
    checksums: &ChecksumSet,
    artifact: &LocalArtifact,
    entry: &ChecksumEntry,
) -> VerificationResult {
    let expected = normalize_hash(&entry.sha256);
    let computed = normalize_hash(&artifact.sha256);
    debug!(
        "verify: {} expected={} computed={}",
        artifact.file_name, expected, computed
    );

    let (status, message) = if expected == computed {
        info!("verify: {} matches release {}", artifact.file_name, release.tag);
        (
            VerificationStatus::Match,
            format!(
                "{} matches the published checksum for release {}.",
                artifact.file_name, release.tag
            ),
        )
    } else {
        warn!("verify: {} does NOT match release {}", artifact.file_name, release.tag);
        (
            VerificationStatus::Mismatch,
            format!(
                "WARNING: {} does not match the published checksum for release {}. \
                 Do not trust this binary with your keys.",
                artifact.file_name, release.tag
            ),
        )
    };

    let mut result = VerificationResult::new(status, message).with_release(release);
    result.expected_hash = Some(expected);
    result.matched_checksum_entry_name = Some(entry.file_name.clone());
    result.checksum_source_asset_name = Some(entry.source_asset.clone());
    result.signature_asset_name = signature_for(release, checksums, Some(entry));
    result.local_artifact = Some(artifact.clone());
    result
}

fn signature_for(
    release: &ReleaseInfo,
    checksums: &ChecksumSet,
    entry: Option<&ChecksumEntry>,
) -> Option<String> {
    let mut preferred: Vec<&str> = Vec::new();
    if let Some(entry) = entry {
        preferred.push(&entry.file_name);
        preferred.push(&entry.source_asset);
    }
    if let Some(source) = checksums.source_asset_name.as_deref() {
        preferred.push(source);
    }
    signature_asset(release, &preferred).map(|asset| asset.name.clone())
}

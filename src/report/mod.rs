use std::fmt::Write;

use crate::engine::models::VerificationResult;
use crate::engine::state::{Tone, VerificationStatus};
use crate::util::format_size;

/// Process exit code for a finished pass.
pub fn exit_code(status: VerificationStatus) -> u8 {
    match status {
        VerificationStatus::Match => 0,
        VerificationStatus::Mismatch | VerificationStatus::NoMatchingChecksum => 1,
        VerificationStatus::Error => 3,
        VerificationStatus::Idle
        | VerificationStatus::Checking
        | VerificationStatus::NoRelease
        | VerificationStatus::NoChecksums
        | VerificationStatus::NoLocalArtifact => 2,
    }
}

pub fn format_report(result: &VerificationResult) -> String {
    let mut output = String::new();
    let fallback = |value: Option<&str>| value.unwrap_or("-").to_owned();

    let banner = match result.status.tone() {
        Tone::Success => "OK",
        Tone::Warning => "!! WARNING !!",
        Tone::Failure => "FAILED",
        Tone::Neutral => "UNVERIFIED",
    };

    let _ = writeln!(&mut output, "Release Verification Report");
    let _ = writeln!(&mut output, "Checked: {}", result.checked_at.to_rfc3339());
    let _ = writeln!(
        &mut output,
        "Summary: {} | status={} | release={}",
        banner,
        result.status,
        fallback(result.release_tag.as_deref()),
    );
    let _ = writeln!(&mut output, "{}", result.message);

    let _ = writeln!(&mut output, "\n=== RELEASE ===");
    let _ = writeln!(&mut output, "Tag: {}", fallback(result.release_tag.as_deref()));
    let _ = writeln!(
        &mut output,
        "Page: {}",
        fallback(result.release_page_url.as_deref())
    );
    let _ = writeln!(
        &mut output,
        "Checksum Source: {}",
        fallback(result.checksum_source_asset_name.as_deref())
    );
    let _ = writeln!(
        &mut output,
        "Signature Asset: {}",
        result
            .signature_asset_name
            .as_deref()
            .map(|name| format!("{name} (located, not verified)"))
            .unwrap_or_else(|| "-".into())
    );

    let _ = writeln!(&mut output, "\n=== LOCAL BINARY ===");
    match &result.local_artifact {
        Some(artifact) => {
            let _ = writeln!(&mut output, "Path: {}", artifact.absolute_path.display());
            let _ = writeln!(&mut output, "Name: {}", artifact.file_name);
            let _ = writeln!(&mut output, "Size: {}", format_size(artifact.size_bytes));
        }
        None => {
            let _ = writeln!(&mut output, "Path: -");
        }
    }

    let _ = writeln!(&mut output, "\n=== HASHES (SHA-256) ===");
    let _ = writeln!(
        &mut output,
        "Matched Entry: {}",
        fallback(result.matched_checksum_entry_name.as_deref())
    );
    let _ = writeln!(
        &mut output,
        "Expected: {}",
        fallback(result.expected_hash.as_deref())
    );
    let _ = writeln!(&mut output, "Computed: {}", fallback(result.computed_hash()));

    output
}

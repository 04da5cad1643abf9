use crate::engine::state::VerificationStatus;

pub type VerifyResult<T> = Result<T, VerifyError>;

/// Failures a verification pass can run into.
///
/// A checksum mismatch is deliberately absent: it is a valid outcome of a
/// pass, reported through [`VerificationStatus::Mismatch`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("network error: {0}")]
    Network(String),

    #[error("no published releases were found")]
    NoReleases,

    #[error("release {tag} does not publish any checksums")]
    NoChecksums { tag: String },

    #[error("no installed application binary was found on this machine")]
    NoLocalArtifact,

    #[error("no published checksum matches the local files ({})", samples.join(", "))]
    NoMatchingChecksum { samples: Vec<String> },

    #[error("unable to read checksum asset {asset}: {reason}")]
    Parse { asset: String, reason: String },

    #[error("verification pass cancelled")]
    Cancelled,
}

impl VerifyError {
    /// Terminal status a pass ends in when it fails with this error.
    pub fn status(&self) -> VerificationStatus {
        match self {
            VerifyError::NoReleases => VerificationStatus::NoRelease,
            VerifyError::NoChecksums { .. } => VerificationStatus::NoChecksums,
            VerifyError::NoLocalArtifact => VerificationStatus::NoLocalArtifact,
            VerifyError::NoMatchingChecksum { .. } => VerificationStatus::NoMatchingChecksum,
            VerifyError::Network(_) | VerifyError::Parse { .. } | VerifyError::Cancelled => {
                VerificationStatus::Error
            }
        }
    }
}

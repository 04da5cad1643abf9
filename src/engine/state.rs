use std::fmt;

use serde::Serialize;

use crate::engine::models::VerificationResult;

/// Where a verification pass stands. Everything past `Checking` is terminal
/// for that pass; a new check always starts over from `Checking`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Idle,
    Checking,
    Match,
    Mismatch,
    NoRelease,
    NoChecksums,
    NoLocalArtifact,
    NoMatchingChecksum,
    Error,
}

/// How a status should be presented to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Success,
    Neutral,
    Warning,
    Failure,
}

impl VerificationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, VerificationStatus::Idle | VerificationStatus::Checking)
    }

    // A completed round-trip with a bad outcome must never read as neutral.
    pub fn tone(self) -> Tone {
        match self {
            VerificationStatus::Match => Tone::Success,
            VerificationStatus::Mismatch | VerificationStatus::NoMatchingChecksum => Tone::Warning,
            VerificationStatus::Error => Tone::Failure,
            VerificationStatus::Idle
            | VerificationStatus::Checking
            | VerificationStatus::NoRelease
            | VerificationStatus::NoChecksums
            | VerificationStatus::NoLocalArtifact => Tone::Neutral,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VerificationStatus::Idle => "Not checked",
            VerificationStatus::Checking => "Checking",
            VerificationStatus::Match => "Verified",
            VerificationStatus::Mismatch => "MISMATCH",
            VerificationStatus::NoRelease => "No release",
            VerificationStatus::NoChecksums => "No checksums",
            VerificationStatus::NoLocalArtifact => "No local binary",
            VerificationStatus::NoMatchingChecksum => "No matching checksum",
            VerificationStatus::Error => "Error",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Monotonically increasing identifier of a verification pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassId(pub u64);

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub enum PassState {
    Checking,
    Finished(VerificationResult),
}

// Every update is tagged so callers can drop results of superseded passes.
#[derive(Clone, Debug)]
pub struct PassUpdate {
    pub pass: PassId,
    pub state: PassState,
}

// Actions triggered by the caller.
#[derive(Clone, Copy, Debug)]
pub enum UserAction {
    Verify,
    Cancel,
}

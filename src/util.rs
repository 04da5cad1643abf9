use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Check whether an optional cancellation flag has been raised.
#[must_use]
pub fn cancel_requested(cancel: Option<&Arc<AtomicBool>>) -> bool {
    cancel
        .map(|flag| flag.load(Ordering::SeqCst))
        .unwrap_or(false)
}

/// Join key between local artifacts and published checksum entries:
/// separators normalised, basename only, lower-cased.
#[must_use]
pub fn canonical_file_name(name: &str) -> String {
    let normalized = name.trim().replace('\\', "/");
    normalized
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Hash strings are compared as opaque tokens after trimming and lower-casing.
#[must_use]
pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_lowercase()
}

/// Keep at most `limit` names so messages stay bounded.
#[must_use]
pub fn sample_names<'a>(names: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<String> {
    names.into_iter().take(limit).map(str::to_owned).collect()
}

/// Render a human-friendly file size.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < MIB {
        format!("{:.1} KB", value / KIB)
    } else if value < GIB {
        format!("{:.1} MB", value / MIB)
    } else {
        format!("{:.1} GB", value / GIB)
    }
}

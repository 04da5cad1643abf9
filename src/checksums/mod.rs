use log::{debug, info, warn};

use crate::engine::models::{ChecksumEntry, ChecksumSet, ReleaseAsset};
use crate::error::VerifyResult;
use crate::networking::ReleaseSource;
use crate::releases::is_signature_name;
use crate::util::{canonical_file_name, normalize_hash};

pub mod bundle;

const LISTING_SUFFIXES: &[&str] = &[".sha256sum", ".sha256"];
const BUNDLE_MARKERS: &[&str] = &["metadata", "checksum", "sha256"];

/// Shape of a checksum-bearing release asset, judged by its name alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumAssetKind {
    /// Plain-text hash listing (`sha256sum` output or a bare hash).
    Listing,
    /// Zip archive carrying one or more listings.
    Bundle,
}

pub fn classify_asset(name: &str) -> Option<ChecksumAssetKind> {
    let lower = name.to_lowercase();
    if lower.ends_with(".zip") {
        return BUNDLE_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
            .then_some(ChecksumAssetKind::Bundle);
    }
    is_listing_name(&lower).then_some(ChecksumAssetKind::Listing)
}

/// Name heuristic for plain-text checksum listings. Detached signatures of a
/// listing (`checksums.sha256.asc`) are not listings themselves.
pub fn is_listing_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    if is_signature_name(&lower) {
        return false;
    }
    LISTING_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) || lower.contains("checksums")
}

/// `wallet.exe.sha256` -> `wallet.exe`; `None` when no checksum suffix is present.
fn strip_listing_suffix(name: &str) -> Option<&str> {
    let lower = name.to_ascii_lowercase();
    LISTING_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| &name[..name.len() - suffix.len()])
        .filter(|stem| !stem.is_empty())
}

/// A `(file name, hash)` line parsed out of a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingLine {
    pub file_name: String,
    pub sha256: String,
}

/// Parse one checksum listing.
///
/// A leading UTF-8 byte-order mark is ignored. Blank lines and `#` comments
/// are skipped. A lone token is a bare hash for the file the listing is
/// named after; otherwise the first token is the hash and the remaining
/// tokens, joined by single spaces, the file name minus a leading `*`
/// binary-mode marker.
pub fn parse_listing(text: &str, listing_name: &str) -> Vec<ListingLine> {
    let bare_target = strip_listing_suffix(canonical_basename(listing_name));
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut lines = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(hash) = tokens.next() else {
            continue;
        };
        let rest = tokens.collect::<Vec<_>>().join(" ");
        let file_name = if rest.is_empty() {
            let Some(target) = bare_target else {
                debug!("harvest: bare hash in {listing_name} has no derivable file name");
                continue;
            };
            target.to_owned()
        } else {
            let name = rest.strip_prefix('*').unwrap_or(&rest).trim_start();
            if name.is_empty() {
                continue;
            }
            name.to_owned()
        };
        let parsed = ListingLine {
            file_name,
            sha256: normalize_hash(hash),
        };
        lines.push(parsed);
    }
    lines
}

fn canonical_basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

impl ChecksumSet {
    /// Merge parsed lines from `asset_name`. The first entry recorded for a
    /// canonical name is kept; conflicting duplicates are logged and dropped.
    /// Returns how many new entries were added.
    pub fn absorb(&mut self, asset_name: &str, lines: Vec<ListingLine>) -> usize {
        let mut added = 0;
        for line in lines {
            let key = canonical_file_name(&line.file_name);
            if key.is_empty() {
                continue;
            }
            match self.entries.get(&key) {
                Some(existing) => {
                    if existing.sha256 != line.sha256 {
                        warn!(
                            "harvest: conflicting checksum for {} in {} (keeping value from {})",
                            key, asset_name, existing.source_asset
                        );
                    }
                }
                None => {
                    let file_name = canonical_basename(&line.file_name).to_owned();
                    self.entries.insert(
                        key,
                        ChecksumEntry {
                            file_name,
                            sha256: line.sha256,
                            source_asset: asset_name.to_owned(),
                        },
                    );
                    added += 1;
                }
            }
        }
        if added > 0 && self.source_asset_name.is_none() {
            self.source_asset_name = Some(asset_name.to_owned());
        }
        added
    }
}

/// Download and parse every checksum-bearing asset of a release.
///
/// A listing that cannot be downloaded fails the harvest; a bundle that
/// downloads but cannot be opened is skipped.
pub async fn harvest<S: ReleaseSource>(
    source: &S,
    assets: &[ReleaseAsset],
) -> VerifyResult<ChecksumSet> {
    let mut set = ChecksumSet::default();
    for asset in assets {
        let Some(kind) = classify_asset(&asset.name) else {
            continue;
        };
        debug!("harvest: fetching {} as {:?}", asset.name, kind);
        let bytes = source.fetch_asset(&asset.download_url).await?;
        let added = match kind {
            ChecksumAssetKind::Listing => {
                let text = String::from_utf8_lossy(&bytes);
                set.absorb(&asset.name, parse_listing(&text, &asset.name))
            }
            ChecksumAssetKind::Bundle => match bundle::read_listings(&asset.name, &bytes) {
                Ok(members) => members
                    .into_iter()
                    .map(|member| {
                        let lines = parse_listing(&member.text, &member.name);
                        set.absorb(&asset.name, lines)
                    })
                    .sum::<usize>(),
                Err(err) => {
                    warn!("harvest: skipping {}: {err}", asset.name);
                    0
                }
            },
        };
        debug!("harvest: {} contributed {} entries", asset.name, added);
    }
    info!(
        "harvest: {} checksum entries (source {:?})",
        set.len(),
        set.source_asset_name
    );
    Ok(set)
}

use std::io::{Cursor, Read};

use log::{debug, warn};
use zip::read::ZipArchive;

use crate::error::{VerifyError, VerifyResult};

use super::is_listing_name;

// A listing inside a bundle larger than this is not a checksum file.
const MAX_MEMBER_BYTES: u64 = 8 * 1024 * 1024;

/// A checksum listing read out of a zip bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundledListing {
    /// Base name of the member inside the archive.
    pub name: String,
    pub text: String,
}

/// Open a zip bundle in memory and return every member that looks like a
/// checksum listing. Unreadable members are skipped; an unreadable archive
/// is a [`VerifyError::Parse`].
pub fn read_listings(asset_name: &str, bytes: &[u8]) -> VerifyResult<Vec<BundledListing>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| VerifyError::Parse {
        asset: asset_name.to_owned(),
        reason: format!("zip parse error: {e}"),
    })?;

    let mut listings = Vec::new();
    for i in 0..archive.len() {
        let entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("harvest: {asset_name}: skipping zip entry {i}: {err}");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry
            .name()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_owned();
        if !is_listing_name(&name) {
            continue;
        }

        let mut raw = Vec::new();
        if let Err(err) = entry.take(MAX_MEMBER_BYTES + 1).read_to_end(&mut raw) {
            warn!("harvest: {asset_name}: unreadable member {name}: {err}");
            continue;
        }
        if raw.len() as u64 > MAX_MEMBER_BYTES {
            warn!("harvest: {asset_name}: skipping member {name} above {MAX_MEMBER_BYTES} bytes");
            continue;
        }
        debug!("harvest: {asset_name}: read {} bytes from {name}", raw.len());
        listings.push(BundledListing {
            name,
            text: String::from_utf8_lossy(&raw).into_owned(),
        });
    }
    Ok(listings)
}

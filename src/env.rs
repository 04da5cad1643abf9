use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::locator::Platform;

pub const DEFAULT_RELEASES_URL: &str =
    "https://api.github.com/repos/pirate-chain/pirate-wallet/releases";
pub const DEFAULT_APP_NAME: &str = "pirate-wallet";
pub const DEFAULT_ANCESTOR_DEPTH: usize = 8;
pub const DEFAULT_MAX_ASSET_BYTES: u64 = 64 * 1024 * 1024;

const RELEASES_URL_VAR: &str = "RELEASE_VERIFY_URL";
const RUNNING_VERSION_VAR: &str = "RELEASE_VERIFY_VERSION";

/// Settings for a verification pass.
#[derive(Clone, Debug)]
pub struct VerifyConfig {
    pub releases_url: String,
    /// Version of the running build, `X.Y.Z` with or without a leading `v`.
    pub running_version: String,
    /// Substituted into `{app}` in the platform path table.
    pub app_name: String,
    pub platform: Platform,
    /// Extra candidate paths, probed before anything else.
    pub extra_artifacts: Vec<PathBuf>,
    pub include_current_exe: bool,
    pub ancestor_depth: usize,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_asset_bytes: u64,
    pub user_agent: String,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            releases_url: DEFAULT_RELEASES_URL.to_owned(),
            running_version: env!("CARGO_PKG_VERSION").to_owned(),
            app_name: DEFAULT_APP_NAME.to_owned(),
            platform: Platform::current(),
            extra_artifacts: Vec::new(),
            include_current_exe: true,
            ancestor_depth: DEFAULT_ANCESTOR_DEPTH,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            user_agent: format!("release-verify/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl VerifyConfig {
    /// Defaults with `RELEASE_VERIFY_URL` / `RELEASE_VERIFY_VERSION` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_var(RELEASES_URL_VAR) {
            config.releases_url = url;
        }
        if let Some(version) = non_empty_var(RUNNING_VERSION_VAR) {
            config.running_version = version;
        }
        config
    }

    /// True when no running version was supplied and the tool's own version
    /// stands in for it. Exact tag matching is then unlikely to succeed.
    pub fn uses_default_version(&self) -> bool {
        self.running_version == env!("CARGO_PKG_VERSION")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Path of the running executable, if the OS can tell us.
pub fn current_exe() -> Option<PathBuf> {
    env::current_exe().ok()
}

pub fn current_dir() -> Option<PathBuf> {
    env::current_dir().ok()
}

/// Directories the installer output table is resolved against: the
/// executable's directory and its ancestors, then the working directory and
/// its ancestors, each walk bounded by `depth`.
pub fn search_roots(exe: Option<&Path>, cwd: Option<&Path>, depth: usize) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    let starts = [exe.and_then(Path::parent), cwd];
    for start in starts.into_iter().flatten() {
        for dir in start.ancestors().take(depth + 1) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            if !roots.iter().any(|known| known == dir) {
                roots.push(dir.to_path_buf());
            }
        }
    }
    roots
}

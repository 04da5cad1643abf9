use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::ValueEnum;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::engine::models::LocalArtifact;
use crate::env::{self, VerifyConfig};
use crate::util::cancel_requested;

const HASH_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    Linux,
    Windows,
    #[value(name = "macos")]
    MacOs,
    Android,
    Ios,
}

// Installer and build outputs per platform, relative to a search root.
// `{app}` is replaced with the configured application name.
const LINUX_PATHS: &[&str] = &[
    "build/linux/x64/release/bundle/{app}",
    "build/linux/arm64/release/bundle/{app}",
    "dist/{app}-linux-x86_64.AppImage",
    "dist/{app}-linux-aarch64.AppImage",
    "dist/{app}_amd64.deb",
    "dist/{app}_arm64.deb",
    "dist/{app}.flatpak",
    "{app}-linux-x86_64.AppImage",
    "{app}-linux-aarch64.AppImage",
    "{app}.AppImage",
];

const WINDOWS_PATHS: &[&str] = &[
    "build/windows/x64/runner/Release/{app}.exe",
    "build/windows/runner/Release/{app}.exe",
    "dist/{app}-windows-x64-setup.exe",
    "dist/{app}-windows-x64.msix",
    "dist/{app}-windows-x64.zip",
    "{app}-windows-x64-setup.exe",
    "{app}.exe",
];

const MACOS_PATHS: &[&str] = &[
    "build/macos/Build/Products/Release/{app}.app/Contents/MacOS/{app}",
    "dist/{app}-macos-universal.dmg",
    "dist/{app}-macos.dmg",
    "{app}-macos-universal.dmg",
    "{app}.app/Contents/MacOS/{app}",
];

const ANDROID_PATHS: &[&str] = &[
    "build/app/outputs/flutter-apk/app-release.apk",
    "build/app/outputs/flutter-apk/app-arm64-v8a-release.apk",
    "build/app/outputs/flutter-apk/app-armeabi-v7a-release.apk",
    "build/app/outputs/flutter-apk/app-x86_64-release.apk",
    "build/app/outputs/bundle/release/app-release.aab",
    "dist/{app}-android.apk",
    "dist/{app}-android.aab",
];

const IOS_PATHS: &[&str] = &[
    "build/ios/ipa/{app}.ipa",
    "build/ios/ipa/Runner.ipa",
    "dist/{app}-ios.ipa",
];

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Linux
        }
    }

    pub fn path_templates(self) -> &'static [&'static str] {
        match self {
            Platform::Linux => LINUX_PATHS,
            Platform::Windows => WINDOWS_PATHS,
            Platform::MacOs => MACOS_PATHS,
            Platform::Android => ANDROID_PATHS,
            Platform::Ios => IOS_PATHS,
        }
    }
}

/// Finds installed or staged application binaries and hashes them.
#[derive(Clone, Debug)]
pub struct ArtifactLocator {
    platform: Platform,
    app_name: String,
    current_exe: Option<PathBuf>,
    extra: Vec<PathBuf>,
    roots: Vec<PathBuf>,
}

impl ArtifactLocator {
    pub fn new(
        platform: Platform,
        app_name: impl Into<String>,
        current_exe: Option<PathBuf>,
        roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            platform,
            app_name: app_name.into(),
            current_exe,
            extra: Vec::new(),
            roots,
        }
    }

    pub fn from_config(config: &VerifyConfig) -> Self {
        let exe = env::current_exe();
        let cwd = env::current_dir();
        let roots = env::search_roots(exe.as_deref(), cwd.as_deref(), config.ancestor_depth);
        let current_exe = if config.include_current_exe { exe } else { None };
        Self::new(config.platform, config.app_name.clone(), current_exe, roots)
            .with_extra(config.extra_artifacts.clone())
    }

    pub fn with_extra(mut self, extra: Vec<PathBuf>) -> Self {
        self.extra = extra;
        self
    }

    /// Candidate paths in discovery order, before existence checks.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.extra.clone();
        paths.extend(self.current_exe.iter().cloned());
        for root in &self.roots {
            for template in self.platform.path_templates() {
                let relative = template.replace("{app}", &self.app_name);
                paths.push(root.join(relative));
            }
        }
        paths
    }

    /// Hash every candidate that exists. Unreadable files are skipped, never
    /// reported as failures. Order follows [`Self::candidates`].
    pub fn locate(&self, cancel: Option<&Arc<AtomicBool>>) -> Vec<LocalArtifact> {
        let candidates = self.candidates();
        debug!(
            "locator: probing {} candidate paths for {:?}",
            candidates.len(),
            self.platform
        );

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut artifacts = Vec::new();
        for candidate in candidates {
            if cancel_requested(cancel) {
                warn!("locator: cancellation requested; stopping scan");
                break;
            }
            // Symlinks collapse onto their target.
            let resolved = fs::canonicalize(&candidate).unwrap_or(candidate);
            if !resolved.is_file() || !seen.insert(resolved.clone()) {
                continue;
            }
            match hash_artifact(&resolved) {
                Ok(artifact) => {
                    debug!(
                        "locator: {} sha256={}",
                        artifact.absolute_path.display(),
                        artifact.sha256
                    );
                    artifacts.push(artifact);
                }
                Err(err) => {
                    warn!("locator: skipping unreadable {}: {err}", resolved.display());
                }
            }
        }
        info!("locator: found {} local artifact(s)", artifacts.len());
        artifacts
    }
}

fn hash_artifact(path: &Path) -> io::Result<LocalArtifact> {
    let size_bytes = fs::metadata(path)?.len();
    let sha256 = sha256_file(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(LocalArtifact {
        absolute_path: path.to_path_buf(),
        file_name,
        size_bytes,
        sha256,
    })
}

/// Streaming SHA-256 of a file as lower-case hex.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUFFER_BYTES];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

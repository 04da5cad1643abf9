use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::checksums;
use crate::engine::models::VerificationResult;
use crate::engine::state::{PassId, PassState, PassUpdate, UserAction, VerificationStatus};
use crate::error::VerifyError;
use crate::locator::ArtifactLocator;
use crate::networking::ReleaseSource;
use crate::releases;

pub mod models;
pub mod state;
pub mod verifier;

/// One locate → select → harvest → verify run. Built fresh for every check;
/// nothing is carried over from earlier passes.
pub struct VerificationPass<S> {
    source: Arc<S>,
    locator: ArtifactLocator,
    running_version: String,
    cancel_flag: Arc<AtomicBool>,
}

impl<S: ReleaseSource> VerificationPass<S> {
    pub fn new(
        source: Arc<S>,
        locator: ArtifactLocator,
        running_version: impl Into<String>,
        cancel_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            locator,
            running_version: running_version.into(),
            cancel_flag,
        }
    }

    pub async fn run(self) -> VerificationResult {
        info!("pass: starting for running version {}", self.running_version);

        // Hashing and the index fetch are independent; harvest waits for the index.
        let locator = self.locator.clone();
        let cancel = self.cancel_flag.clone();
        let scan = tokio::task::spawn_blocking(move || locator.locate(Some(&cancel)));
        let (index, scanned) = tokio::join!(self.source.fetch_releases(), scan);

        let releases = match index {
            Ok(releases) => releases,
            Err(err) => {
                error!("pass: release index unavailable: {err}");
                return VerificationResult::from_error(&err);
            }
        };
        let release = match releases::select_release(&releases, &self.running_version) {
            Ok(release) => release,
            Err(err) => {
                warn!("pass: {err}");
                return VerificationResult::from_error(&err);
            }
        };
        info!("pass: verifying against release {}", release.tag);

        let checksums = match checksums::harvest(self.source.as_ref(), &release.assets).await {
            Ok(checksums) => checksums,
            Err(err) => {
                error!("pass: checksum harvest failed: {err}");
                return VerificationResult::from_error(&err).with_release(release);
            }
        };

        let artifacts = match scanned {
            Ok(artifacts) => artifacts,
            Err(err) => {
                error!("pass: local scan did not complete: {err}");
                return VerificationResult::new(
                    VerificationStatus::Error,
                    format!("Verification failed: local artifact scan did not complete ({err})"),
                )
                .with_release(release);
            }
        };
        if self.cancel_flag.load(Ordering::SeqCst) {
            warn!("pass: cancelled before verdict");
            return VerificationResult::from_error(&VerifyError::Cancelled);
        }

        verifier::verify(release, &checksums, &artifacts)
    }
}

struct InFlight {
    id: PassId,
    cancel_flag: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Runs verification passes for a caller and tells current results from
/// superseded ones.
pub struct VerificationEngine<S> {
    pub state: VerificationStatus,
    source: Arc<S>,
    locator: ArtifactLocator,
    running_version: String,
    last_issued: u64,
    current: Option<InFlight>,
}

impl<S: ReleaseSource> VerificationEngine<S> {
    pub fn new(source: S, locator: ArtifactLocator, running_version: impl Into<String>) -> Self {
        Self {
            state: VerificationStatus::Idle,
            source: Arc::new(source),
            locator,
            running_version: running_version.into(),
            last_issued: 0,
            current: None,
        }
    }

    pub fn handle_action(
        &mut self,
        action: UserAction,
        updates: &mpsc::UnboundedSender<PassUpdate>,
    ) -> Option<PassId> {
        match action {
            UserAction::Verify => {
                info!("action: Verify");
                Some(self.start(updates))
            }
            UserAction::Cancel => {
                warn!("action: Cancel");
                self.cancel();
                None
            }
        }
    }

    /// Start a new pass, superseding any pass still in flight.
    pub fn start(&mut self, updates: &mpsc::UnboundedSender<PassUpdate>) -> PassId {
        self.abort_in_flight();

        self.last_issued += 1;
        let id = PassId(self.last_issued);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let pass = VerificationPass::new(
            self.source.clone(),
            self.locator.clone(),
            self.running_version.clone(),
            cancel_flag.clone(),
        );

        self.state = VerificationStatus::Checking;
        updates
            .send(PassUpdate {
                pass: id,
                state: PassState::Checking,
            })
            .ok();

        let tx = updates.clone();
        let task = tokio::spawn(async move {
            let result = pass.run().await;
            debug!("pass {id}: finished with {}", result.status);
            let _ = tx.send(PassUpdate {
                pass: id,
                state: PassState::Finished(result),
            });
        });
        self.current = Some(InFlight {
            id,
            cancel_flag,
            task,
        });
        info!("engine: started pass {id}");
        id
    }

    /// Abandon the in-flight pass. It emits nothing further.
    pub fn cancel(&mut self) {
        self.abort_in_flight();
        if self.state == VerificationStatus::Checking {
            self.state = VerificationStatus::Idle;
        }
    }

    /// Whether `id` is the pass whose results the caller should show.
    pub fn is_current(&self, id: PassId) -> bool {
        self.current.as_ref().is_some_and(|pass| pass.id == id)
    }

    /// Apply an update to the engine state. Returns `false` for updates of
    /// superseded or cancelled passes, which callers must drop.
    pub fn apply(&mut self, update: &PassUpdate) -> bool {
        if !self.is_current(update.pass) {
            debug!("engine: dropping stale update from pass {}", update.pass);
            return false;
        }
        self.state = match &update.state {
            PassState::Checking => VerificationStatus::Checking,
            PassState::Finished(result) => result.status,
        };
        true
    }

    /// Run a single pass and wait for its result. If `interrupt` resolves
    /// first the pass is cancelled and a cancellation result is returned.
    pub async fn run_to_completion(
        &mut self,
        interrupt: impl Future<Output = ()>,
    ) -> VerificationResult {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.handle_action(UserAction::Verify, &tx);
        tokio::pin!(interrupt);
        loop {
            tokio::select! {
                update = rx.recv() => {
                    let Some(update) = update else {
                        break;
                    };
                    if !self.apply(&update) || !self.state.is_terminal() {
                        continue;
                    }
                    if let PassState::Finished(result) = update.state {
                        return result;
                    }
                }
                () = &mut interrupt => {
                    self.handle_action(UserAction::Cancel, &tx);
                    return VerificationResult::from_error(&VerifyError::Cancelled);
                }
            }
        }
        let result = VerificationResult::from_error(&VerifyError::Cancelled);
        self.state = result.status;
        result
    }

    fn abort_in_flight(&mut self) {
        if let Some(pass) = self.current.take()
            && !pass.task.is_finished()
        {
            pass.cancel_flag.store(true, Ordering::SeqCst);
            pass.task.abort();
            warn!("engine: pass {} abandoned", pass.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::checksums::bundle::tests::zip_bytes;
    use crate::engine::models::{ReleaseAsset, ReleaseInfo};
    use crate::error::VerifyResult;
    use crate::locator::Platform;

    // sha256("hello world")
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    struct FakeSource {
        releases: VerifyResult<Vec<ReleaseInfo>>,
        assets: HashMap<String, Vec<u8>>,
        delay: Option<Duration>,
    }

    impl FakeSource {
        fn new(releases: Vec<ReleaseInfo>) -> Self {
            Self {
                releases: Ok(releases),
                assets: HashMap::new(),
                delay: None,
            }
        }

        fn with_asset(mut self, name: &str, bytes: Vec<u8>) -> Self {
            self.assets.insert(asset_url(name), bytes);
            self
        }
    }

    impl ReleaseSource for FakeSource {
        async fn fetch_releases(&self) -> VerifyResult<Vec<ReleaseInfo>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.releases.clone()
        }

        async fn fetch_asset(&self, url: &str) -> VerifyResult<Vec<u8>> {
            self.assets
                .get(url)
                .cloned()
                .ok_or_else(|| VerifyError::Network(format!("asset status error: 404 for {url}")))
        }
    }

    fn asset_url(name: &str) -> String {
        format!("https://downloads.invalid/{name}")
    }

    fn release(tag: &str, draft: bool, assets: &[&str]) -> ReleaseInfo {
        ReleaseInfo {
            tag: tag.into(),
            display_name: String::new(),
            page_url: format!("https://releases.invalid/{tag}"),
            is_draft: draft,
            is_prerelease: false,
            assets: assets
                .iter()
                .map(|name| ReleaseAsset {
                    name: (*name).into(),
                    download_url: asset_url(name),
                })
                .collect(),
        }
    }

    fn install(root: &Path) {
        let path = root.join("app-linux-x86_64.AppImage");
        std::fs::write(path, b"hello world").unwrap();
    }

    fn locator(root: &Path) -> ArtifactLocator {
        ArtifactLocator::new(Platform::Linux, "app", None, vec![root.into()])
    }

    async fn run(source: FakeSource, root: &Path, version: &str) -> VerificationResult {
        let mut engine = VerificationEngine::new(source, locator(root), version);
        let result = engine.run_to_completion(std::future::pending()).await;
        assert_eq!(engine.state, result.status);
        result
    }

    #[tokio::test]
    async fn published_checksum_matches_installed_binary() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let source = FakeSource::new(vec![release("v1.2.0", false, &["checksums.sha256"])])
            .with_asset(
                "checksums.sha256",
                format!("{HELLO_SHA256}  app-linux-x86_64.AppImage\n").into_bytes(),
            );

        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::Match);
        assert_eq!(result.release_tag.as_deref(), Some("v1.2.0"));
        assert_eq!(
            result.matched_checksum_entry_name.as_deref(),
            Some("app-linux-x86_64.AppImage")
        );
        assert_eq!(result.computed_hash(), Some(HELLO_SHA256));
    }

    #[tokio::test]
    async fn last_character_difference_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let mut published = HELLO_SHA256.to_owned();
        published.pop();
        published.push('0');
        let source = FakeSource::new(vec![release("v1.2.0", false, &["checksums.sha256"])])
            .with_asset(
                "checksums.sha256",
                format!("{published}  app-linux-x86_64.AppImage\n").into_bytes(),
            );

        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::Mismatch);
    }

    #[tokio::test]
    async fn empty_index_is_no_release_regardless_of_local_state() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let result = run(FakeSource::new(vec![]), dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::NoRelease);
    }

    #[tokio::test]
    async fn index_failure_is_error_with_cause() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new(vec![]);
        source.releases = Err(VerifyError::Network("release index request failed: timed out".into()));
        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::Error);
        assert!(result.message.contains("timed out"));
    }

    #[tokio::test]
    async fn release_without_checksum_assets_is_no_checksums() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let source = FakeSource::new(vec![release(
            "v1.2.0",
            false,
            &["app-linux-x86_64.AppImage", "app-windows.zip", "notes.txt"],
        )]);
        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::NoChecksums);
    }

    #[tokio::test]
    async fn checksums_without_local_binary_is_no_local_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(vec![release("v1.2.0", false, &["checksums.sha256"])])
            .with_asset(
                "checksums.sha256",
                format!("{HELLO_SHA256}  app-linux-x86_64.AppImage\n").into_bytes(),
            );
        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::NoLocalArtifact);
    }

    #[tokio::test]
    async fn unreachable_checksum_asset_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let source = FakeSource::new(vec![release("v1.2.0", false, &["checksums.sha256"])]);
        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::Error);
        assert_eq!(result.release_tag.as_deref(), Some("v1.2.0"));
    }

    #[tokio::test]
    async fn zip_bundled_checksums_are_harvested() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let listing = format!("{HELLO_SHA256}  app-linux-x86_64.AppImage\n");
        let bundle = zip_bytes(&[
            ("LICENSE", b"MIT"),
            ("release/checksums.sha256", listing.as_bytes()),
        ]);
        let source = FakeSource::new(vec![release(
            "v1.2.0",
            false,
            &["release-metadata.zip", "release-metadata.zip.minisig"],
        )])
        .with_asset("release-metadata.zip", bundle);

        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::Match);
        assert_eq!(
            result.checksum_source_asset_name.as_deref(),
            Some("release-metadata.zip")
        );
        assert_eq!(
            result.signature_asset_name.as_deref(),
            Some("release-metadata.zip.minisig")
        );
    }

    #[tokio::test]
    async fn bundled_listing_with_byte_order_mark_matches() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let listing = format!("\u{FEFF}{HELLO_SHA256}  app-linux-x86_64.AppImage\r\n");
        let bundle = zip_bytes(&[("checksums.sha256", listing.as_bytes())]);
        let source = FakeSource::new(vec![release("v1.2.0", false, &["sha256-bundle.zip"])])
            .with_asset("sha256-bundle.zip", bundle);

        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::Match);
    }

    #[tokio::test]
    async fn corrupt_bundle_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let source = FakeSource::new(vec![release(
            "v1.2.0",
            false,
            &["metadata.zip", "checksums.sha256"],
        )])
        .with_asset("metadata.zip", b"PK\x03\x04 truncated".to_vec())
        .with_asset(
            "checksums.sha256",
            format!("{HELLO_SHA256}  app-linux-x86_64.AppImage\n").into_bytes(),
        );
        let result = run(source, dir.path(), "1.2.0").await;
        assert_eq!(result.status, VerificationStatus::Match);
    }

    #[tokio::test]
    async fn exact_version_selects_draft_release() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let source = FakeSource::new(vec![
            release("v2.0.0", true, &["checksums.sha256"]),
            release("v1.9.0", false, &[]),
        ])
        .with_asset(
            "checksums.sha256",
            format!("{HELLO_SHA256}  app-linux-x86_64.AppImage\n").into_bytes(),
        );
        let result = run(source, dir.path(), "2.0.0").await;
        assert_eq!(result.release_tag.as_deref(), Some("v2.0.0"));
        assert_eq!(result.status, VerificationStatus::Match);
    }

    #[tokio::test]
    async fn new_pass_supersedes_in_flight_pass() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new(vec![]);
        source.delay = Some(Duration::from_millis(200));
        let mut engine = VerificationEngine::new(source, locator(dir.path()), "1.0.0");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let first = engine.handle_action(UserAction::Verify, &tx).unwrap();
        let second = engine.handle_action(UserAction::Verify, &tx).unwrap();
        assert!(second > first);
        assert!(!engine.is_current(first));
        assert!(engine.is_current(second));
        drop(tx);

        let mut finished = Vec::new();
        while let Some(update) = rx.recv().await {
            let accepted = engine.apply(&update);
            if let PassState::Finished(result) = &update.state {
                finished.push((update.pass, accepted, result.status));
            }
        }
        assert_eq!(finished, vec![(second, true, VerificationStatus::NoRelease)]);
        assert_eq!(engine.state, VerificationStatus::NoRelease);
    }

    #[tokio::test]
    async fn interrupt_cancels_a_running_pass() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new(vec![]);
        source.delay = Some(Duration::from_secs(5));
        let mut engine = VerificationEngine::new(source, locator(dir.path()), "1.0.0");

        let result = engine
            .run_to_completion(tokio::time::sleep(Duration::from_millis(50)))
            .await;
        assert!(result.message.contains("cancelled"));
        assert_eq!(engine.state, VerificationStatus::Idle);
    }

    #[tokio::test]
    async fn cancelled_pass_emits_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new(vec![]);
        source.delay = Some(Duration::from_millis(200));
        let mut engine = VerificationEngine::new(source, locator(dir.path()), "1.0.0");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = engine.handle_action(UserAction::Verify, &tx).unwrap();
        assert_eq!(engine.state, VerificationStatus::Checking);
        assert!(engine.handle_action(UserAction::Cancel, &tx).is_none());
        drop(tx);

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0].state, PassState::Checking));
        assert!(!engine.is_current(id));
        assert_eq!(engine.state, VerificationStatus::Idle);
    }
}

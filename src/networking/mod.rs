use std::future::Future;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};

use crate::engine::models::ReleaseInfo;
use crate::env::VerifyConfig;
use crate::error::{VerifyError, VerifyResult};
use crate::releases::parse_release_index;

#[cfg(test)]
pub(crate) mod test_server;

/// Where releases and their assets come from.
pub trait ReleaseSource: Send + Sync + 'static {
    /// Fetch the release index in index order. A missing index (404) is an
    /// empty list, not an error.
    fn fetch_releases(&self) -> impl Future<Output = VerifyResult<Vec<ReleaseInfo>>> + Send;

    /// Download one asset into memory.
    fn fetch_asset(&self, url: &str) -> impl Future<Output = VerifyResult<Vec<u8>>> + Send;
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
    releases_url: String,
    max_asset_bytes: u64,
}

impl NetworkClient {
    pub fn new(config: &VerifyConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self {
            client,
            releases_url: config.releases_url.clone(),
            max_asset_bytes: config.max_asset_bytes,
        }
    }
}

impl ReleaseSource for NetworkClient {
    async fn fetch_releases(&self) -> VerifyResult<Vec<ReleaseInfo>> {
        info!("releases: fetching index from {}", self.releases_url);
        let resp = self
            .client
            .get(&self.releases_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| VerifyError::Network(format!("release index request failed: {e}")))?;
        if resp.status() == StatusCode::NOT_FOUND {
            warn!("releases: index not found at {}", self.releases_url);
            return Ok(Vec::new());
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| VerifyError::Network(format!("release index status error: {e}")))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| VerifyError::Network(format!("release index body error: {e}")))?;
        let releases = parse_release_index(&body)?;
        debug!("releases: index lists {} releases", releases.len());
        Ok(releases)
    }

    async fn fetch_asset(&self, url: &str) -> VerifyResult<Vec<u8>> {
        debug!("download: {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VerifyError::Network(format!("asset request failed: {e}")))?
            .error_for_status()
            .map_err(|e| VerifyError::Network(format!("asset status error: {e}")))?;

        if let Some(len) = resp.content_length()
            && len > self.max_asset_bytes
        {
            return Err(VerifyError::Network(format!(
                "asset {url} is {len} bytes, above the {} byte limit",
                self.max_asset_bytes
            )));
        }

        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| VerifyError::Network(format!("asset stream error: {e}")))?;
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_asset_bytes {
                return Err(VerifyError::Network(format!(
                    "asset {url} exceeds the {} byte limit",
                    self.max_asset_bytes
                )));
            }
        }
        Ok(body)
    }
}

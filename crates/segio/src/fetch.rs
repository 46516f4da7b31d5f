use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::DownloadError;

/// One-shot resource fetch. The pipelines drive ordering, retries and
/// concurrency on top of this seam.
#[async_trait]
pub trait SegmentFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError>;
}

/// HTTP fetcher carrying the upstream's required header set, typically
/// `Referer`/`Origin` of the player page the manifest came from.
pub struct HttpSegmentFetch {
    client: Client,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpSegmentFetch {
    pub fn new(client: Client, headers: HeaderMap, timeout: Duration) -> Self {
        Self {
            client,
            headers,
            timeout,
        }
    }
}

#[async_trait]
impl SegmentFetch for HttpSegmentFetch {
    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}

fn is_retryable(err: &DownloadError) -> bool {
    match err {
        DownloadError::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
        // 4xx will not get better on retry.
        DownloadError::UpstreamStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Fetches with linear backoff: attempt n sleeps `n * delay_base` before
/// retrying.
pub async fn fetch_with_retry(
    fetcher: &dyn SegmentFetch,
    url: &str,
    config: &PipelineConfig,
) -> Result<Bytes, DownloadError> {
    let mut attempt = 0u32;
    loop {
        match fetcher.fetch(url).await {
            Ok(bytes) => {
                debug!(url, bytes = bytes.len(), "segment fetched");
                return Ok(bytes);
            }
            Err(err) if attempt < config.segment_retries && is_retryable(&err) => {
                attempt += 1;
                warn!(url, attempt, %err, "segment fetch failed, retrying");
                tokio::time::sleep(config.retry_delay_base * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fetches a manifest body as text.
pub async fn fetch_manifest(
    fetcher: &dyn SegmentFetch,
    url: &str,
    config: &PipelineConfig,
) -> Result<String, DownloadError> {
    let bytes = fetch_with_retry(fetcher, url, config).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Resolves a master-or-media manifest down to its ordered segment list,
/// following the highest-bandwidth variant when one exists.
pub async fn resolve_segments(
    fetcher: &dyn SegmentFetch,
    manifest_url: &str,
    config: &PipelineConfig,
) -> Result<Vec<playlist::SegmentRef>, DownloadError> {
    let body = fetch_manifest(fetcher, manifest_url, config).await?;
    match playlist::select_variant(&body, manifest_url)? {
        Some(variant) => {
            debug!(bandwidth = variant.bandwidth, url = %variant.url, "variant selected");
            let media = fetch_manifest(fetcher, &variant.url, config).await?;
            Ok(playlist::list_segments(&media, &variant.url)?)
        }
        None => Ok(playlist::list_segments(&body, manifest_url)?),
    }
}

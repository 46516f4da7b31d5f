use async_trait::async_trait;
use futures::future::join_all;
use providers::{ContentRef, StreamSource};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::descriptor::{AddonDescriptor, addon_content_id};
use crate::error::AddonError;
use crate::normalize::{normalize_stream, sort_sources};
use crate::stream::{AddonStream, StreamsEnvelope};

/// Transport seam for addon stream listings. Production goes over HTTP;
/// tests inject deterministic fetchers.
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch_streams(
        &self,
        addon: &AddonDescriptor,
        kind: &str,
        id: &str,
    ) -> Result<Vec<AddonStream>, AddonError>;
}

pub struct HttpStreamFetcher {
    client: Client,
}

impl HttpStreamFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamFetcher for HttpStreamFetcher {
    async fn fetch_streams(
        &self,
        addon: &AddonDescriptor,
        kind: &str,
        id: &str,
    ) -> Result<Vec<AddonStream>, AddonError> {
        let url = addon.stream_url(kind, id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AddonError::UpstreamStatus(response.status().as_u16()));
        }
        let body = response.text().await?;
        let envelope: StreamsEnvelope = serde_json::from_str(&body)?;
        Ok(envelope.streams)
    }
}

/// Queries every enabled addon in parallel with an independent per-addon
/// timeout. Failures are isolated: an addon that errors, times out or
/// returns garbage contributes nothing, and the aggregate never fails.
pub async fn aggregate_streams(
    fetcher: &dyn StreamFetcher,
    addons: &[AddonDescriptor],
    kind: &str,
    id: &str,
    per_addon_timeout: Duration,
) -> Vec<StreamSource> {
    let queries = addons.iter().map(|addon| async move {
        match tokio::time::timeout(per_addon_timeout, fetcher.fetch_streams(addon, kind, id)).await
        {
            Ok(Ok(streams)) => {
                debug!(addon = %addon.name, count = streams.len(), "addon answered");
                streams
                    .iter()
                    .filter_map(|s| normalize_stream(&addon.name, s))
                    .collect::<Vec<_>>()
            }
            Ok(Err(e)) => {
                warn!(addon = %addon.name, error = %e, "addon query failed");
                Vec::new()
            }
            Err(_) => {
                let err = AddonError::Timeout(per_addon_timeout);
                warn!(addon = %addon.name, error = %err, "addon query failed");
                Vec::new()
            }
        }
    });

    let mut sources: Vec<StreamSource> = join_all(queries).await.into_iter().flatten().collect();
    sort_sources(&mut sources);
    sources
}

/// Streams for one resolved content reference, encoded through the addon
/// protocol's type/id scheme.
pub async fn streams_for_content(
    fetcher: &dyn StreamFetcher,
    addons: &[AddonDescriptor],
    content: &ContentRef,
    per_addon_timeout: Duration,
) -> Vec<StreamSource> {
    let (kind, id) = addon_content_id(content);
    aggregate_streams(fetcher, addons, &kind, &id, per_addon_timeout).await
}

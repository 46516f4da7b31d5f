//! Client-side download pipeline: segments are fetched with bounded
//! concurrency into index-addressed slots, then transmuxed in-process
//! into one fragmented MP4. No subprocess is involved, which is what
//! lets this path run inside a browser-facing client build.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, SegmentLossMode};
use crate::error::DownloadError;
use crate::fetch::{SegmentFetch, fetch_with_retry, resolve_segments};
use crate::progress::{ProgressEvent, fetch_percent};

pub struct ClientPipeline {
    fetcher: Arc<dyn SegmentFetch>,
    config: PipelineConfig,
}

impl ClientPipeline {
    pub fn new(fetcher: Arc<dyn SegmentFetch>, config: PipelineConfig) -> Self {
        Self { fetcher, config }
    }

    /// Downloads one rendition and returns the finished MP4 bytes.
    /// Progress events are best-effort; a dropped receiver never stalls
    /// the download.
    pub async fn download(
        &self,
        manifest_url: &str,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, DownloadError> {
        let segments = resolve_segments(&*self.fetcher, manifest_url, &self.config).await?;
        let total = segments.len();
        progress
            .send(ProgressEvent::Started {
                total_segments: total,
            })
            .await
            .ok();

        // Completions land out of order; index-addressed slots restore
        // manifest order for free.
        let mut slots: Vec<Option<Bytes>> = vec![None; total];
        let mut fetches = stream::iter(segments.into_iter().map(|segment| {
            let fetcher = self.fetcher.clone();
            let config = self.config.clone();
            async move {
                let result = fetch_with_retry(&*fetcher, &segment.url, &config).await;
                (segment.index, result)
            }
        }))
        .buffer_unordered(self.config.client_concurrency);

        let mut completed = 0usize;
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                item = fetches.next() => item,
            };
            let Some((index, result)) = item else {
                break;
            };
            match result {
                Ok(bytes) => slots[index] = Some(bytes),
                Err(err) => match self.config.loss_mode {
                    SegmentLossMode::Lenient => {
                        warn!(index, %err, "dropping unrecoverable segment");
                    }
                    SegmentLossMode::Strict => {
                        return Err(DownloadError::SegmentLoss { index });
                    }
                },
            }
            completed += 1;
            progress
                .send(ProgressEvent::Fetching {
                    completed,
                    total,
                    percent: fetch_percent(completed, total),
                })
                .await
                .ok();
        }
        drop(fetches);

        progress.send(ProgressEvent::Muxing).await.ok();
        let present: Vec<Bytes> = slots.into_iter().flatten().collect();
        debug!(segments = present.len(), total, "transmuxing fetched segments");
        let mp4 = tokio::task::spawn_blocking(move || tsmux::transmux(&present))
            .await
            .map_err(|e| DownloadError::TaskPanic(e.to_string()))??;

        progress
            .send(ProgressEvent::Completed {
                total_bytes: mp4.len() as u64,
            })
            .await
            .ok();
        Ok(mp4)
    }

    /// Downloads a batch of episodes strictly one after another, pausing
    /// between them so a whole-season grab does not hammer the upstream.
    pub async fn download_season(
        &self,
        manifest_urls: &[String],
        progress: mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Vec<Result<Vec<u8>, DownloadError>> {
        let mut results = Vec::with_capacity(manifest_urls.len());
        for (i, url) in manifest_urls.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.inter_episode_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                results.push(Err(DownloadError::Cancelled));
                break;
            }
            results.push(self.download(url, progress.clone(), cancel).await);
        }
        results
    }
}

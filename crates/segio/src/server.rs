//! Server-side download pipeline: segments are prefetched ahead of a
//! strictly ordered writer that feeds an ffmpeg copy-remux, and the MP4
//! output is handed to the HTTP layer as a byte-chunk channel.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use playlist::SegmentRef;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, SegmentLossMode};
use crate::error::DownloadError;
use crate::fetch::{SegmentFetch, fetch_with_retry, resolve_segments};
use crate::remux::Remuxer;

pub struct ServerPipeline {
    fetcher: Arc<dyn SegmentFetch>,
    config: PipelineConfig,
}

impl ServerPipeline {
    pub fn new(fetcher: Arc<dyn SegmentFetch>, config: PipelineConfig) -> Self {
        Self { fetcher, config }
    }

    pub async fn resolve_segments(
        &self,
        manifest_url: &str,
    ) -> Result<Vec<SegmentRef>, DownloadError> {
        resolve_segments(&*self.fetcher, manifest_url, &self.config).await
    }

    /// Runs the full remux download. MP4 chunks arrive on the returned
    /// channel as ffmpeg emits them, so the response can start before
    /// the total size is known.
    pub async fn stream_remux(
        &self,
        manifest_url: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<Result<Bytes, DownloadError>>, DownloadError> {
        let segments = self.resolve_segments(manifest_url).await?;
        debug!(segments = segments.len(), manifest_url, "starting remux download");
        let remuxer = Remuxer::spawn(&self.config.ffmpeg_path)?;
        let (tx, rx) = mpsc::channel::<Result<Bytes, DownloadError>>(16);

        let fetcher = self.fetcher.clone();
        let config = self.config.clone();
        let feeder_cancel = cancel.clone();
        let feeder_tx = tx.clone();
        let mut stdin = remuxer.stdin;
        tokio::spawn(async move {
            match feed_segments(fetcher, &segments, &config, &mut stdin, &feeder_cancel).await {
                Ok(written) => debug!(written, "all segments written to remuxer"),
                Err(err) => {
                    warn!(%err, "segment feed aborted");
                    feeder_tx.send(Err(err)).await.ok();
                    feeder_cancel.cancel();
                }
            }
            // stdin drops here; ffmpeg sees EOF and finalizes the file.
        });

        let mut child = remuxer.child;
        let mut stdout = remuxer.stdout;
        tokio::spawn(async move {
            let mut sent = 0u64;
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let read = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = child.kill().await;
                        return;
                    }
                    read = stdout.read(&mut buf) => read,
                };
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        sent += n as u64;
                        if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                            // Consumer went away mid-download.
                            let _ = child.kill().await;
                            return;
                        }
                    }
                    Err(err) => {
                        tx.send(Err(err.into())).await.ok();
                        let _ = child.kill().await;
                        return;
                    }
                }
            }
            match child.wait().await {
                Ok(status) if !status.success() => {
                    let code = status.code().unwrap_or(-1);
                    if sent == 0 {
                        tx.send(Err(DownloadError::SubprocessFailure { status: code }))
                            .await
                            .ok();
                    } else {
                        // Output already reached the client, nothing to
                        // retract; the truncated tail speaks for itself.
                        warn!(code, sent, "remux subprocess exited non-zero after output");
                    }
                }
                Ok(_) => debug!(sent, "remux download complete"),
                Err(err) => {
                    tx.send(Err(err.into())).await.ok();
                }
            }
        });

        Ok(rx)
    }
}

/// Prefetches up to `prefetch_depth` segments ahead while writing them
/// strictly in index order. Returns the byte count written.
pub(crate) async fn feed_segments<W: AsyncWrite + Unpin>(
    fetcher: Arc<dyn SegmentFetch>,
    segments: &[SegmentRef],
    config: &PipelineConfig,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    let mut queue: VecDeque<(usize, JoinHandle<Result<Bytes, DownloadError>>)> = VecDeque::new();
    let abort_queue = |queue: &mut VecDeque<(usize, JoinHandle<_>)>| {
        for (_, handle) in queue.drain(..) {
            handle.abort();
        }
    };

    let mut next = 0;
    let mut written = 0u64;
    while next < segments.len() || !queue.is_empty() {
        while next < segments.len() && queue.len() < config.prefetch_depth {
            let fetcher = fetcher.clone();
            let url = segments[next].url.clone();
            let config = config.clone();
            queue.push_back((
                next,
                tokio::spawn(async move { fetch_with_retry(&*fetcher, &url, &config).await }),
            ));
            next += 1;
        }

        let Some((index, mut handle)) = queue.pop_front() else {
            break;
        };
        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                handle.abort();
                abort_queue(&mut queue);
                return Err(DownloadError::Cancelled);
            }
            joined = &mut handle => joined,
        };
        match joined {
            Ok(Ok(bytes)) => {
                writer.write_all(&bytes).await?;
                written += bytes.len() as u64;
            }
            Ok(Err(err)) => match config.loss_mode {
                SegmentLossMode::Lenient => {
                    warn!(index, %err, "dropping unrecoverable segment");
                }
                SegmentLossMode::Strict => {
                    abort_queue(&mut queue);
                    return Err(DownloadError::SegmentLoss { index });
                }
            },
            Err(join_err) => {
                abort_queue(&mut queue);
                return Err(DownloadError::TaskPanic(join_err.to_string()));
            }
        }
    }
    writer.flush().await?;
    Ok(written)
}

use std::time::Duration;

/// What to do when a segment stays unavailable after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentLossMode {
    /// Abort the whole download.
    Strict,
    /// Drop the segment and keep going; a short glitch beats a dead file.
    #[default]
    Lenient,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Segments fetched ahead of the remux writer on the server path.
    pub prefetch_depth: usize,
    /// Parallel fetches on the client path.
    pub client_concurrency: usize,
    pub segment_retries: u32,
    /// Linear backoff step: attempt n waits n times this long.
    pub retry_delay_base: Duration,
    pub request_timeout: Duration,
    pub loss_mode: SegmentLossMode,
    pub ffmpeg_path: String,
    /// Pause between episodes in a season batch.
    pub inter_episode_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prefetch_depth: 8,
            client_concurrency: 3,
            segment_retries: 3,
            retry_delay_base: Duration::from_millis(500),
            request_timeout: Duration::from_secs(15),
            loss_mode: SegmentLossMode::default(),
            ffmpeg_path: "ffmpeg".to_string(),
            inter_episode_delay: Duration::from_secs(2),
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("manifest error: {0}")]
    Playlist(#[from] playlist::PlaylistError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream returned {status} for {url}")]
    UpstreamStatus { status: u16, url: String },
    #[error("segment {index} unrecoverable after retries")]
    SegmentLoss { index: usize },
    #[error("remux subprocess exited with {status}")]
    SubprocessFailure { status: i32 },
    #[error("transmux error: {0}")]
    Mux(#[from] tsmux::MuxError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("segment task failed: {0}")]
    TaskPanic(String),
    #[error("download cancelled")]
    Cancelled,
}

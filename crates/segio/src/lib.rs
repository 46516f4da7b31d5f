//! # Segio
//!
//! Segment download pipelines over resolved HLS manifests.
//!
//! Two delivery paths share the fetch/retry machinery:
//! - [`ServerPipeline`]: prefetches segments ahead of a strictly ordered
//!   writer feeding an ffmpeg copy-remux subprocess, streaming the MP4
//!   out as it is produced;
//! - [`ClientPipeline`]: bounded-concurrency fetch into index-addressed
//!   slots, then an in-process TS-to-fMP4 transmux with no subprocess.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod progress;
pub mod remux;
pub mod server;

pub use client::ClientPipeline;
pub use config::{PipelineConfig, SegmentLossMode};
pub use error::DownloadError;
pub use fetch::{HttpSegmentFetch, SegmentFetch};
pub use progress::ProgressEvent;
pub use server::ServerPipeline;

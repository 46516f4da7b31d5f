use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::DownloadError;

/// Running ffmpeg copy-remux: raw TS in on stdin, fragmented MP4 out on
/// stdout. No re-encode happens, codec bitstreams pass through.
pub struct Remuxer {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

impl Remuxer {
    pub fn spawn(ffmpeg_path: &str) -> Result<Self, DownloadError> {
        let mut child = Command::new(ffmpeg_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-c",
                "copy",
                // A non-seekable stdout cannot take a normal mp4; the
                // fragmented layout streams.
                "-movflags",
                "frag_keyframe+empty_moov",
                "-f",
                "mp4",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        debug!(ffmpeg_path, pid = child.id(), "remux subprocess spawned");
        let stdin = child.stdin.take().ok_or_else(|| {
            DownloadError::Io(std::io::Error::other("ffmpeg stdin not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            DownloadError::Io(std::io::Error::other("ffmpeg stdout not captured"))
        })?;
        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }
}

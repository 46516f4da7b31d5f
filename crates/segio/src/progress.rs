/// Progress reporting for the client-side pipeline. Fetch progress maps
/// onto 0..=90 percent; the remaining ten cover the transmux and final
/// assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total_segments: usize },
    Fetching { completed: usize, total: usize, percent: u8 },
    Muxing,
    Completed { total_bytes: u64 },
}

pub(crate) fn fetch_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 90;
    }
    (completed * 90 / total) as u8
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("short transport packet: {0} bytes")]
    ShortPacket(usize),
    #[error("missing transport sync byte")]
    MissingSyncByte,
    #[error("malformed {table} section: {reason}")]
    MalformedSection {
        table: &'static str,
        reason: &'static str,
    },
    #[error("malformed PES header: {0}")]
    MalformedPes(&'static str),
    #[error("malformed ADTS stream: {0}")]
    MalformedAdts(&'static str),
    #[error("malformed H.264 stream: {0}")]
    MalformedAvc(&'static str),
    #[error("no elementary streams found")]
    NoStreams,
}

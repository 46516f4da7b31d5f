use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("invalid manifest url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("manifest parse failure: {0}")]
    ParseFailure(String),
    #[error("manifest lists no segments")]
    NoSegments,
}

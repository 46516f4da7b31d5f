use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),
    #[error("parse failure: {0}")]
    ParseFailure(String),
    #[error("decode failure: {0}")]
    DecodeFailure(String),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddonError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("addon returned status {0}")]
    UpstreamStatus(u16),
    #[error("malformed addon response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("addon timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_its_budget() {
        let err = AddonError::Timeout(std::time::Duration::from_secs(2));
        assert_eq!(err.to_string(), "addon timed out after 2s");
    }
}

use serde::{Deserialize, Serialize};

use super::quality::Quality;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtitle {
    pub label: String,
    pub url: String,
}

/// One playable source, normalized across providers.
///
/// Invariant: `is_torrent` is true exactly when `url` is absent and
/// `info_hash` is present. A present `url` is always absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSource {
    pub provider: String,
    pub url: Option<String>,
    pub quality: Quality,
    pub translation: String,
    pub size_bytes: Option<u64>,
    pub is_torrent: bool,
    pub info_hash: Option<String>,
    pub subtitles: Vec<Subtitle>,
}

impl StreamSource {
    pub fn direct<P: Into<String>, U: Into<String>>(provider: P, url: U, quality: Quality) -> Self {
        Self {
            provider: provider.into(),
            url: Some(url.into()),
            quality,
            translation: String::new(),
            size_bytes: None,
            is_torrent: false,
            info_hash: None,
            subtitles: Vec::new(),
        }
    }

    pub fn torrent<P: Into<String>, H: Into<String>>(
        provider: P,
        info_hash: H,
        quality: Quality,
    ) -> Self {
        Self {
            provider: provider.into(),
            url: None,
            quality,
            translation: String::new(),
            size_bytes: None,
            is_torrent: true,
            info_hash: Some(info_hash.into()),
            subtitles: Vec::new(),
        }
    }

    pub fn with_translation<T: Into<String>>(mut self, translation: T) -> Self {
        self.translation = translation.into();
        self
    }

    pub fn with_size(mut self, size_bytes: Option<u64>) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

/// Fallback iframe-embeddable player, used when no direct HLS is resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub iframe_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_constructor_upholds_invariant() {
        let source = StreamSource::torrent("addon", "deadbeef", Quality::Q1080);
        assert!(source.is_torrent);
        assert!(source.url.is_none());
        assert!(source.info_hash.is_some());

        let direct = StreamSource::direct("vibix", "https://cdn.example/x.mp4", Quality::Q720);
        assert!(!direct.is_torrent);
        assert!(direct.url.is_some());
        assert!(direct.info_hash.is_none());
    }
}

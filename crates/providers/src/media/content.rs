use serde::{Deserialize, Serialize};

/// Identifies what to resolve. Immutable for the duration of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    /// Numeric catalog id shared by all providers.
    pub catalog_id: u64,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Index into the provider-ordered translation list.
    pub audio_index: Option<usize>,
}

impl ContentRef {
    pub fn movie(catalog_id: u64) -> Self {
        Self {
            catalog_id,
            season: None,
            episode: None,
            audio_index: None,
        }
    }

    pub fn episode(catalog_id: u64, season: u32, episode: u32) -> Self {
        Self {
            catalog_id,
            season: Some(season),
            episode: Some(episode),
            audio_index: None,
        }
    }

    pub fn is_series(&self) -> bool {
        self.season.is_some() && self.episode.is_some()
    }
}

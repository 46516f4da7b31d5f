use rustc_hash::FxHashMap;
use std::sync::Mutex;

use crate::media::{ContentRef, PlayerInfo, Translation};

/// Key for one resolved content item. Episodes of the same title resolve
/// to different manifests, so season and episode are part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub catalog_id: u64,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl From<&ContentRef> for CacheKey {
    fn from(content: &ContentRef) -> Self {
        Self {
            catalog_id: content.catalog_id,
            season: content.season,
            episode: content.episode,
        }
    }
}

/// Resolution result worth keeping for the lifetime of the server process.
#[derive(Debug, Clone, Default)]
pub struct CachedSource {
    pub hls: Option<String>,
    pub players: Vec<PlayerInfo>,
    pub translations: Vec<Translation>,
}

/// Explicit resolver cache owned by the server process and passed by
/// reference to call sites. Replaces the ambient module-level cache the
/// decoders used to share.
#[derive(Debug, Default)]
pub struct SourceCache {
    inner: Mutex<FxHashMap<CacheKey, CachedSource>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedSource> {
        self.inner.lock().expect("source cache poisoned").get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: CachedSource) {
        self.inner
            .lock()
            .expect("source cache poisoned")
            .insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("source cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let cache = SourceCache::new();
        let key = CacheKey::from(&ContentRef::movie(42));
        assert!(cache.get(&key).is_none());

        cache.insert(
            key,
            CachedSource {
                hls: Some("https://cdn.example/master.m3u8".to_string()),
                ..Default::default()
            },
        );
        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.hls.as_deref(), Some("https://cdn.example/master.m3u8"));
    }

    #[test]
    fn episodes_of_one_title_do_not_collide() {
        let cache = SourceCache::new();
        let e1 = CacheKey::from(&ContentRef::episode(7, 1, 1));
        let e2 = CacheKey::from(&ContentRef::episode(7, 1, 2));
        cache.insert(
            e1,
            CachedSource {
                hls: Some("https://cdn.example/s1e1.m3u8".to_string()),
                ..Default::default()
            },
        );
        assert!(cache.get(&e2).is_none());
        assert_eq!(cache.len(), 1);
    }
}

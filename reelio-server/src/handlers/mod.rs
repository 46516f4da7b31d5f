pub mod addons;
pub mod download;
pub mod proxy;
pub mod stream;
pub mod vibix;

use providers::cache::{CacheKey, CachedSource};
use providers::media::ContentRef;
use providers::providers::vidara::Vidara;

use crate::server::AppState;

/// Resolves a content reference through vidara, consulting the process
/// cache first. Both the direct HLS lookup and the fallback player list
/// run concurrently; either side failing leaves the other intact.
pub(crate) async fn resolve_source(state: &AppState, content: &ContentRef) -> CachedSource {
    let key = CacheKey::from(content);
    if let Some(hit) = state.cache.get(&key) {
        return hit;
    }

    let vidara = Vidara::new(
        state.http.clone(),
        &state.config.vidara.headers,
        state.config.vidara.base_url.clone(),
    );
    let (resolution, players) = tokio::join!(vidara.resolve(content), vidara.players(content));

    let resolved = CachedSource {
        hls: resolution.hls,
        players,
        translations: resolution.translations,
    };
    // Cache only non-empty results so transient upstream failures do not
    // stick for the process lifetime.
    if resolved.hls.is_some() || !resolved.players.is_empty() {
        state.cache.insert(key, resolved.clone());
    }
    resolved
}

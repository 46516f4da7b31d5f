use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use providers::media::{ContentRef, PlayerInfo, Quality, StreamSource, Translation};
use providers::providers::kinoray::Kinoray;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::resolve_source;
use crate::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub id: u64,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub audio: Option<usize>,
    /// Free-text title enables the page-scraping resolver as a second
    /// source.
    pub title: Option<String>,
    pub year: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub streams: Vec<StreamSource>,
    pub players: Vec<PlayerInfo>,
    pub translations: Vec<Translation>,
}

pub async fn stream(
    State(state): State<SharedState>,
    Query(query): Query<StreamQuery>,
) -> Result<Json<StreamResponse>, ApiError> {
    let content = ContentRef {
        catalog_id: query.id,
        season: query.season,
        episode: query.episode,
        audio_index: query.audio,
    };

    let resolved = resolve_source(&state, &content).await;
    let mut streams = Vec::new();
    if let Some(hls) = &resolved.hls {
        // Players pull segments through this server, never the upstream
        // directly.
        streams.push(StreamSource::direct(
            "vidara",
            state.proxy.manifest_url(hls),
            Quality::Unknown,
        ));
    }
    if let Some(title) = &query.title {
        streams.extend(kinoray_streams(&state, title, query.year, query.audio).await);
    }
    if !state.config.addons.is_empty() {
        let fetcher = addons::HttpStreamFetcher::new(state.http.clone());
        streams.extend(
            addons::streams_for_content(
                &fetcher,
                &state.config.addons,
                &content,
                Duration::from_secs(state.config.addon_timeout_secs),
            )
            .await,
        );
    }
    addons::normalize::sort_sources(&mut streams);

    if streams.is_empty() && resolved.players.is_empty() && resolved.translations.is_empty() {
        return Err(ApiError::NoStreams);
    }
    Ok(Json(StreamResponse {
        streams,
        players: resolved.players,
        translations: resolved.translations,
    }))
}

/// Second resolver: title search, detail scrape, CDN stream decode. Any
/// stage failing contributes nothing.
async fn kinoray_streams(
    state: &SharedState,
    title: &str,
    year: Option<u32>,
    audio: Option<usize>,
) -> Vec<StreamSource> {
    let kinoray = Kinoray::new(
        state.http.clone(),
        &state.config.kinoray.headers,
        state.config.kinoray.mirrors.clone(),
    );

    let Some(results) = kinoray.search(title, year).await else {
        return Vec::new();
    };
    let Some(first) = results.first() else {
        return Vec::new();
    };
    let Some(details) = kinoray.details(&first.url).await else {
        return Vec::new();
    };
    let Some(translation) = details
        .translations
        .get(audio.unwrap_or(0))
        .or_else(|| details.translations.first())
    else {
        debug!(title, "kinoray: no translations listed");
        return Vec::new();
    };
    let Some(cdn_streams) = kinoray.streams(details.content_id, &translation.id).await else {
        return Vec::new();
    };

    cdn_streams
        .into_iter()
        .map(|s| {
            let url = playback_url(&state.proxy, s.url);
            let mut source = StreamSource::direct("kinoray", url, s.quality)
                .with_translation(translation.display_name.clone());
            source.subtitles = s.subtitles;
            source
        })
        .collect()
}

/// HLS manifests route through the rewrite proxy so segment fetches carry
/// the upstream's header bundle; plain files go to the player direct.
fn playback_url(proxy: &playlist::ProxyUrls, url: String) -> String {
    let path = url.split('?').next().unwrap_or(url.as_str());
    if path.ends_with(".m3u8") {
        proxy.manifest_url(&url)
    } else {
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlist::ProxyUrls;

    #[test]
    fn hls_urls_route_through_the_proxy() {
        let proxy = ProxyUrls::new("http://127.0.0.1:8888");
        let url = "https://cdn.example/v/index.m3u8?token=x".to_string();
        assert_eq!(
            playback_url(&proxy, url),
            "http://127.0.0.1:8888/proxy/manifest?url=https%3A%2F%2Fcdn.example%2Fv%2Findex.m3u8%3Ftoken%3Dx"
        );
    }

    #[test]
    fn plain_files_stay_direct() {
        let proxy = ProxyUrls::new("http://127.0.0.1:8888");
        let url = "https://cdn.example/movie-1080.mp4".to_string();
        assert_eq!(playback_url(&proxy, url), "https://cdn.example/movie-1080.mp4");
    }
}

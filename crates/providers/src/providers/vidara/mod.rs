//! Vidara embed-API resolver.
//!
//! The player page carries an inline `makePlayer({ ... })` call whose
//! argument is parsed with the restricted literal parser in [`literal`],
//! never evaluated. Movies expose `source.hls` plus an `audio.names` /
//! `audio.order` pair; series expose `playlist.seasons[].episodes` keyed by
//! season number and string episode number. A second, independent endpoint
//! lists fallback iframe players.

pub mod literal;

use tracing::{debug, warn};

use crate::extractor::source::{Extractor, HeaderBundle};
use crate::media::{ContentRef, PlayerInfo, Quality, Translation};
use literal::Value;

/// Everything one page resolution can produce.
#[derive(Debug, Clone, Default)]
pub struct VidaraResolution {
    pub hls: Option<String>,
    pub translations: Vec<Translation>,
}

pub struct Vidara {
    extractor: Extractor,
    base_url: String,
}

impl Vidara {
    pub fn new(client: reqwest::Client, bundle: &HeaderBundle, base_url: String) -> Self {
        Self {
            extractor: Extractor::new("vidara", client, bundle),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves the player page for a content reference. Any failure
    /// degrades to an empty resolution.
    pub async fn resolve(&self, content: &ContentRef) -> VidaraResolution {
        let url = format!("{}/player/{}", self.base_url, content.catalog_id);
        let page = match self.extractor.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "vidara: page body read failed");
                    return VidaraResolution::default();
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "vidara: player page non-2xx");
                return VidaraResolution::default();
            }
            Err(e) => {
                warn!(error = %e, "vidara: player page fetch failed");
                return VidaraResolution::default();
            }
        };

        let Some(raw) = literal::extract_call_literal(&page, "makePlayer") else {
            debug!(id = content.catalog_id, "vidara: no makePlayer literal");
            return VidaraResolution::default();
        };
        let player = match literal::parse(raw) {
            Ok(player) => player,
            Err(e) => {
                warn!(error = %e, "vidara: player literal unparseable");
                return VidaraResolution::default();
            }
        };

        let hls = if content.is_series() {
            series_hls(
                &player,
                content.season.unwrap_or(1),
                content.episode.unwrap_or(1),
            )
        } else {
            player
                .get("source")
                .and_then(|s| s.get("hls"))
                .and_then(Value::as_str)
                .map(unescape_url)
        };

        VidaraResolution {
            hls,
            translations: audio_translations(&player),
        }
    }

    /// Queries the independent aggregator endpoint for fallback iframe
    /// players. Independent of [`resolve`]; failures yield an empty list.
    pub async fn players(&self, content: &ContentRef) -> Vec<PlayerInfo> {
        let url = format!("{}/api/players", self.base_url);
        let response = self
            .extractor
            .get(&url)
            .query(&[("id", content.catalog_id.to_string())])
            .send()
            .await;
        let body: serde_json::Value = match response {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "vidara: players body not json");
                    return Vec::new();
                }
            },
            Ok(resp) => {
                debug!(status = %resp.status(), "vidara: players non-2xx");
                return Vec::new();
            }
            Err(e) => {
                debug!(error = %e, "vidara: players fetch failed");
                return Vec::new();
            }
        };

        body.as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let name = entry.get("name")?.as_str()?;
                        let iframe = entry.get("iframe")?.as_str()?;
                        Some(PlayerInfo {
                            name: name.to_string(),
                            iframe_url: unescape_url(iframe),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Walks `playlist.seasons[].episodes` for the requested season/episode.
/// Episode keys are strings in the upstream literal.
fn series_hls(player: &Value, season: u32, episode: u32) -> Option<String> {
    let seasons = player.get("playlist")?.get("seasons")?.as_array()?;
    let season_value = seasons.iter().find(|s| {
        s.get("season")
            .and_then(Value::as_f64)
            .is_some_and(|n| n as u32 == season)
    })?;

    let episodes = season_value.get("episodes")?;
    let episode_value = match episodes {
        Value::Object(_) => episodes.get(&episode.to_string())?.clone(),
        Value::Array(items) => items
            .iter()
            .find(|e| {
                e.get("episode")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n == episode.to_string())
            })?
            .clone(),
        _ => return None,
    };

    episode_value
        .get("hls")
        .and_then(Value::as_str)
        .map(unescape_url)
}

/// Builds the translation list from the `audio.names`/`audio.order` pair.
/// `order` carries indices into `names` in selection order.
fn audio_translations(player: &Value) -> Vec<Translation> {
    let Some(audio) = player.get("audio") else {
        return Vec::new();
    };
    let Some(names) = audio.get("names").and_then(Value::as_array) else {
        return Vec::new();
    };

    let indices: Vec<usize> = match audio.get("order").and_then(Value::as_array) {
        Some(order) => order
            .iter()
            .filter_map(|v| v.as_f64().map(|n| n as usize))
            .collect(),
        None => (0..names.len()).collect(),
    };

    indices
        .into_iter()
        .filter_map(|i| names.get(i).and_then(Value::as_str).map(|n| (i, n)))
        .map(|(i, name)| Translation::new(i.to_string(), name, Quality::Unknown, "vidara"))
        .collect()
}

/// Reverses the string-literal escaping the upstream applies to URLs:
/// unicode-escaped `&`/`=`, escaped slashes and quotes.
pub fn unescape_url(raw: &str) -> String {
    raw.replace("\\u0026", "&")
        .replace("\\u003d", "=")
        .replace("\\u003D", "=")
        .replace("\\/", "/")
        .replace("\\\"", "\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::vidara::literal::parse;

    const SERIES_LITERAL: &str = r#"{
        playlist: {
            seasons: [
                { season: 1, episodes: { "1": { hls: "https://cdn.example/s1e1.m3u8" },
                                          "2": { hls: "https://cdn.example/s1e2.m3u8" } } },
                { season: 2, episodes: { "1": { hls: "https://cdn.example/s2e1.m3u8" } } }
            ]
        },
        audio: { names: ["Original", "Dubbed", "Commentary"], order: [1, 0, 2] }
    }"#;

    #[test]
    fn series_lookup_by_season_and_string_episode() {
        let player = parse(SERIES_LITERAL).unwrap();
        assert_eq!(
            series_hls(&player, 1, 2).as_deref(),
            Some("https://cdn.example/s1e2.m3u8")
        );
        assert_eq!(
            series_hls(&player, 2, 1).as_deref(),
            Some("https://cdn.example/s2e1.m3u8")
        );
        assert!(series_hls(&player, 3, 1).is_none());
        assert!(series_hls(&player, 1, 9).is_none());
    }

    #[test]
    fn audio_order_drives_translation_selection_order() {
        let player = parse(SERIES_LITERAL).unwrap();
        let translations = audio_translations(&player);
        let names: Vec<&str> = translations.iter().map(|t| t.display_name.as_str()).collect();
        assert_eq!(names, vec!["Dubbed", "Original", "Commentary"]);
        // Ids are the indices into `names`, preserved for re-selection.
        assert_eq!(translations[0].id, "1");
    }

    #[test]
    fn movie_source_hls_is_unescaped() {
        let player = parse(
            r#"{ source: { hls: "https:\/\/cdn.example\/hls\/master.m3u8?a=1&b=2" } }"#,
        )
        .unwrap();
        let raw = player
            .get("source")
            .and_then(|s| s.get("hls"))
            .and_then(Value::as_str)
            .unwrap();
        // The literal parser already resolved backslash escapes; a second
        // pass over an unparsed string covers raw regex extraction paths.
        assert_eq!(
            unescape_url(r"https:\/\/cdn.example\/x.m3u8?a=1&b=2"),
            "https://cdn.example/x.m3u8?a=1&b=2"
        );
        assert!(raw.contains("master.m3u8"));
    }

    #[test]
    fn missing_audio_block_yields_no_translations() {
        let player = parse(r#"{ source: { hls: "x" } }"#).unwrap();
        assert!(audio_translations(&player).is_empty());
    }
}

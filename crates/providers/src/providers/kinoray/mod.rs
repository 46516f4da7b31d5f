//! Kinoray page-scraping resolver.
//!
//! No API exists; everything is regex extraction over rendered HTML plus a
//! single obfuscated CDN endpoint. Mirrors are tried in fixed priority
//! order and the first one that yields a non-empty result wins. Every
//! stage failure degrades to `None` so the aggregating caller only ever
//! observes "no data".

pub mod cipher;

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use crate::extractor::source::{Extractor, HeaderBundle};
use crate::media::{Quality, Subtitle, Translation};

static SEARCH_ITEM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<li[^>]*class="search-item"[^>]*>.*?<a href="(?P<url>https?://[^"]+)"[^>]*>(?P<title>[^<]+?)(?:\s*\((?P<year>\d{4})\))?</a>"#,
    )
    .unwrap()
});

// Two generations of the detail-page markup are in the wild; the first
// regex that yields any match wins.
static DETAIL_ID_REGEX_V1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-content_id="(\d+)""#).unwrap());
static DETAIL_ID_REGEX_V2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"initPlayer\((\d+),"#).unwrap());

static TRANSLATOR_REGEX_V1: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<li[^>]*data-translator_id="(?P<id>\d+)"[^>]*>(?P<name>[^<]+)</li>"#).unwrap()
});
static TRANSLATOR_REGEX_V2: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-voice="(?P<id>\d+)"\s+data-title="(?P<name>[^"]+)""#).unwrap()
});

/// `[quality]url` pairs inside a decoded CDN payload.
static STREAM_PAIR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?P<quality>[^\]]+)\](?P<url>https?://[^,\s\[]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub year: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TitleDetails {
    pub content_id: u64,
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone)]
pub struct CdnStream {
    pub quality: Quality,
    pub quality_label: String,
    pub url: String,
    pub subtitles: Vec<Subtitle>,
}

pub struct Kinoray {
    extractor: Extractor,
    mirrors: Vec<String>,
}

impl Kinoray {
    pub fn new(client: reqwest::Client, bundle: &HeaderBundle, mirrors: Vec<String>) -> Self {
        Self {
            extractor: Extractor::new("kinoray", client, bundle),
            mirrors,
        }
    }

    /// Searches every mirror in priority order; first non-empty parse wins.
    pub async fn search(&self, title: &str, year: Option<u32>) -> Option<Vec<SearchResult>> {
        let query = match year {
            Some(year) => format!("{title} {year}"),
            None => title.to_string(),
        };

        for mirror in &self.mirrors {
            let url = format!("{mirror}/index.php?do=search");
            let form = [
                ("do", "search"),
                ("subaction", "search"),
                ("story", query.as_str()),
            ];
            let body = match self.extractor.post(&url).form(&form).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!(mirror, error = %e, "kinoray: search body read failed");
                        continue;
                    }
                },
                Ok(resp) => {
                    debug!(mirror, status = %resp.status(), "kinoray: search non-2xx");
                    continue;
                }
                Err(e) => {
                    debug!(mirror, error = %e, "kinoray: search request failed");
                    continue;
                }
            };

            let results = parse_search_results(&body);
            if !results.is_empty() {
                return Some(results);
            }
        }

        warn!(title, "kinoray: all mirrors returned empty search results");
        None
    }

    /// Fetches a result page and extracts the numeric content id plus the
    /// available translations.
    pub async fn details(&self, page_url: &str) -> Option<TitleDetails> {
        let body = match self.extractor.get(page_url).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.ok()?,
            Ok(resp) => {
                debug!(page_url, status = %resp.status(), "kinoray: detail non-2xx");
                return None;
            }
            Err(e) => {
                debug!(page_url, error = %e, "kinoray: detail request failed");
                return None;
            }
        };
        parse_details(&body)
    }

    /// Requests the CDN endpoint for one translation and decodes the
    /// obfuscated stream list.
    pub async fn streams(&self, content_id: u64, translator_id: &str) -> Option<Vec<CdnStream>> {
        let id = content_id.to_string();
        let form = [
            ("id", id.as_str()),
            ("translator_id", translator_id),
            ("action", "get_stream"),
        ];

        for mirror in &self.mirrors {
            let url = format!("{mirror}/ajax/get_cdn_series/");
            let response = match self.extractor.post(&url).form(&form).send().await {
                Ok(resp) if resp.status().is_success() => resp,
                Ok(resp) => {
                    debug!(mirror, status = %resp.status(), "kinoray: cdn non-2xx");
                    continue;
                }
                Err(e) => {
                    debug!(mirror, error = %e, "kinoray: cdn request failed");
                    continue;
                }
            };

            let body: serde_json::Value = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(mirror, error = %e, "kinoray: cdn body not json");
                    continue;
                }
            };
            if !body.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
                continue;
            }
            let Some(payload) = body.get("url").and_then(|v| v.as_str()) else {
                continue;
            };

            let decoded = match cipher::decode(payload) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(mirror, error = %e, "kinoray: cdn payload undecodable");
                    continue;
                }
            };

            let subtitles = body
                .get("subtitle")
                .and_then(|v| v.as_str())
                .map(parse_subtitles)
                .unwrap_or_default();

            let streams = parse_stream_pairs(&decoded, subtitles);
            if !streams.is_empty() {
                return Some(streams);
            }
        }
        None
    }
}

fn parse_search_results(body: &str) -> Vec<SearchResult> {
    SEARCH_ITEM_REGEX
        .captures_iter(body)
        .map(|caps| SearchResult {
            url: caps["url"].to_string(),
            title: caps["title"].trim().to_string(),
            year: caps.name("year").and_then(|m| m.as_str().parse().ok()),
        })
        .collect()
}

fn parse_details(body: &str) -> Option<TitleDetails> {
    let content_id = DETAIL_ID_REGEX_V1
        .captures(body)
        .or_else(|| DETAIL_ID_REGEX_V2.captures(body))
        .and_then(|caps| caps[1].parse().ok())?;

    let mut translations = parse_translators(body, &TRANSLATOR_REGEX_V1);
    if translations.is_empty() {
        translations = parse_translators(body, &TRANSLATOR_REGEX_V2);
    }

    Some(TitleDetails {
        content_id,
        translations,
    })
}

fn parse_translators(body: &str, regex: &Regex) -> Vec<Translation> {
    regex
        .captures_iter(body)
        .map(|caps| {
            Translation::new(
                caps["id"].to_string(),
                caps["name"].trim().to_string(),
                Quality::Unknown,
                "kinoray",
            )
        })
        .collect()
}

fn parse_stream_pairs(decoded: &str, subtitles: Vec<Subtitle>) -> Vec<CdnStream> {
    STREAM_PAIR_REGEX
        .captures_iter(decoded)
        .filter(|caps| Url::parse(&caps["url"]).is_ok())
        .map(|caps| CdnStream {
            quality: Quality::from_label(&caps["quality"]),
            quality_label: caps["quality"].to_string(),
            url: caps["url"].to_string(),
            subtitles: subtitles.clone(),
        })
        .collect()
}

fn parse_subtitles(raw: &str) -> Vec<Subtitle> {
    STREAM_PAIR_REGEX
        .captures_iter(raw)
        .map(|caps| Subtitle {
            label: caps["quality"].to_string(),
            url: caps["url"].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FIXTURE: &str = r#"
        <ul>
        <li class="search-item"><div class="poster"></div>
            <a href="https://kinoray.example/films/inception.html">Inception (2010)</a></li>
        <li class="search-item">
            <a href="https://kinoray.example/films/solaris.html">Solaris</a></li>
        </ul>"#;

    #[test]
    fn extracts_search_results_with_optional_year() {
        let results = parse_search_results(SEARCH_FIXTURE);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Inception");
        assert_eq!(results[0].year, Some(2010));
        assert_eq!(results[1].title, "Solaris");
        assert_eq!(results[1].year, None);
    }

    #[test]
    fn detail_regex_v1_wins_when_both_match() {
        let body = r#"
            <div data-content_id="4411"></div>
            <script>initPlayer(9999,{});</script>
            <ul><li class="voice" data-translator_id="56">Original</li>
            <li class="voice" data-translator_id="238">Dubbed</li></ul>"#;
        let details = parse_details(body).unwrap();
        assert_eq!(details.content_id, 4411);
        assert_eq!(details.translations.len(), 2);
        assert_eq!(details.translations[0].id, "56");
        assert_eq!(details.translations[1].display_name, "Dubbed");
    }

    #[test]
    fn detail_regex_falls_back_to_second_variant() {
        let body = r#"
            <script>initPlayer(777,{});</script>
            <span data-voice="3" data-title="Multi"></span>"#;
        let details = parse_details(body).unwrap();
        assert_eq!(details.content_id, 777);
        assert_eq!(details.translations.len(), 1);
        assert_eq!(details.translations[0].display_name, "Multi");
    }

    #[test]
    fn translation_order_is_preserved() {
        let body = r#"
            <div data-content_id="1"></div>
            <li data-translator_id="9">Nine</li>
            <li data-translator_id="2">Two</li>
            <li data-translator_id="5">Five</li>"#;
        let details = parse_details(body).unwrap();
        let ids: Vec<&str> = details.translations.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["9", "2", "5"]);
    }

    #[test]
    fn decoded_payload_yields_quality_url_pairs() {
        let plain = "[1080p]https://cdn.example/hls/1080/index.m3u8,[720p]https://cdn.example/hls/720/index.m3u8";
        let payload = cipher::encode(plain, 7);
        let decoded = cipher::decode(&payload).unwrap();
        let streams = parse_stream_pairs(&decoded, Vec::new());
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].quality, Quality::Q1080);
        assert_eq!(streams[0].url, "https://cdn.example/hls/1080/index.m3u8");
        assert_eq!(streams[1].quality_label, "720p");
    }

    #[test]
    fn subtitle_pairs_parse_like_stream_pairs() {
        let subs = parse_subtitles("[English]https://cdn.example/subs/en.vtt,[Deutsch]https://cdn.example/subs/de.vtt");
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].label, "English");
        assert_eq!(subs[1].url, "https://cdn.example/subs/de.vtt");
    }
}

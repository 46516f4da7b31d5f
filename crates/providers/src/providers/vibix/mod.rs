//! Vibix embed resolver.
//!
//! Embed URLs look like `{host}/{type}/{id}/{hash}/{quality}`. The player
//! page references a bundled script carrying a base64-encoded API path; that
//! path (or a historically-known fallback) is then tried across the mirror
//! matrix until a `links` map comes back. Link values are obfuscated with
//! the rotate-then-base64 cipher in [`cipher`].

pub mod cipher;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use crate::extractor::error::ProviderError;
use crate::extractor::source::{Extractor, HeaderBundle};

pub static EMBED_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?([^/]+)/([a-z]+)/(\d+)/([0-9a-f]{16,})/([0-9]{3,4}p?)/?$").unwrap()
});

static SCRIPT_SRC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<script[^>]+src="([^"]+?\.js[^"]*)""#).unwrap());

static API_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"atob\(["']([A-Za-z0-9+/=]{8,})["']\)"#).unwrap());

/// Mirrors tried after the embed host itself; the upstream rotates domains
/// faster than it rotates the API shape.
const MIRROR_HOSTS: &[&str] = &["vibix.cc", "vibix.tv", "vibix-cdn.net"];

/// API paths observed historically, used when script discovery fails.
const FALLBACK_API_PATHS: &[&str] = &["/api/v2/play", "/api/play", "/player/links"];

/// Parsed embed reference: `{host}/{type}/{id}/{hash}/{quality}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedRef {
    pub host: String,
    pub kind: String,
    pub id: String,
    pub hash: String,
    pub quality: String,
}

/// One decoded playable link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VibixLink {
    pub quality: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct LinksResponse {
    #[serde(default)]
    links: HashMap<String, String>,
}

/// Parses an embed URL, preferring the strict pattern and falling back to a
/// permissive path-segment split for non-conforming hosts.
pub fn parse_embed_url(url: &str) -> Option<EmbedRef> {
    if let Some(caps) = EMBED_URL_REGEX.captures(url) {
        return Some(EmbedRef {
            host: caps[1].to_string(),
            kind: caps[2].to_string(),
            id: caps[3].to_string(),
            hash: caps[4].to_string(),
            quality: caps[5].to_string(),
        });
    }

    // Permissive fallback: any URL whose path carries the four segments.
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.len() < 4 {
        return None;
    }
    Some(EmbedRef {
        host,
        kind: segments[0].to_string(),
        id: segments[1].to_string(),
        hash: segments[2].to_string(),
        quality: segments[3].to_string(),
    })
}

pub struct Vibix {
    extractor: Extractor,
}

impl Vibix {
    pub fn new(client: reqwest::Client, bundle: &HeaderBundle) -> Self {
        Self {
            extractor: Extractor::new("vibix", client, bundle),
        }
    }

    /// Resolves an embed URL into decoded links, best quality first.
    /// Failures at any stage degrade to an empty list.
    pub async fn resolve(&self, embed_url: &str) -> Vec<VibixLink> {
        let Some(embed) = parse_embed_url(embed_url) else {
            warn!(url = %embed_url, "vibix: unrecognized embed url");
            return Vec::new();
        };

        let api_paths = match self.discover_api_path(&embed).await {
            Some(path) => vec![path],
            None => FALLBACK_API_PATHS.iter().map(|p| p.to_string()).collect(),
        };

        for path in &api_paths {
            if let Some(links) = self.query_link_matrix(&embed, path).await {
                return decode_links(&links);
            }
        }

        warn!(id = %embed.id, "vibix: link matrix exhausted");
        Vec::new()
    }

    /// Fetches the player page, follows its bundled script and pulls the
    /// base64-encoded API path out of it.
    async fn discover_api_path(&self, embed: &EmbedRef) -> Option<String> {
        let page_url = format!(
            "https://{}/{}/{}/{}/{}",
            embed.host, embed.kind, embed.id, embed.hash, embed.quality
        );
        let page = self.fetch_text(&page_url).await?;
        let script_src = SCRIPT_SRC_REGEX.captures(&page)?.get(1)?.as_str().to_string();

        let script_url = Url::parse(&page_url).ok()?.join(&script_src).ok()?;
        let script = self.fetch_text(script_url.as_str()).await?;

        let encoded = API_PATH_REGEX.captures(&script)?.get(1)?.as_str();
        let decoded = STANDARD.decode(encoded).ok()?;
        let path = String::from_utf8(decoded).ok()?;
        if path.starts_with('/') {
            debug!(%path, "vibix: discovered api path");
            Some(path)
        } else {
            None
        }
    }

    /// Tries {embed host, mirrors} x {GET, POST} until one request yields a
    /// non-empty `links` map.
    async fn query_link_matrix(
        &self,
        embed: &EmbedRef,
        api_path: &str,
    ) -> Option<HashMap<String, String>> {
        let mut hosts: Vec<&str> = vec![embed.host.as_str()];
        hosts.extend(MIRROR_HOSTS.iter().filter(|h| **h != embed.host));

        for host in hosts {
            for method in [Method::GET, Method::POST] {
                match self.query_links(host, api_path, method.clone(), embed).await {
                    Ok(links) if !links.is_empty() => return Some(links),
                    Ok(_) => {}
                    Err(e) => {
                        debug!(host, %method, error = %e, "vibix: link request failed")
                    }
                }
            }
        }
        None
    }

    async fn query_links(
        &self,
        host: &str,
        api_path: &str,
        method: Method,
        embed: &EmbedRef,
    ) -> Result<HashMap<String, String>, ProviderError> {
        let url = format!("https://{host}{api_path}");
        let params = [
            ("type", embed.kind.as_str()),
            ("id", embed.id.as_str()),
            ("hash", embed.hash.as_str()),
        ];

        let request = if method == Method::POST {
            self.extractor.post(&url).form(&params)
        } else {
            self.extractor.get(&url).query(&params)
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::UpstreamStatus(response.status().as_u16()));
        }
        let body: LinksResponse = response.json().await?;
        Ok(body.links)
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        match self.extractor.get(url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                debug!(url, status = %response.status(), "vibix: non-2xx page fetch");
                None
            }
            Err(e) => {
                debug!(url, error = %e, "vibix: page fetch failed");
                None
            }
        }
    }
}

/// Decodes every candidate link and sorts by descending numeric quality
/// prefix ("1080" before "720p" before unparseable labels).
fn decode_links(links: &HashMap<String, String>) -> Vec<VibixLink> {
    let mut decoded: Vec<VibixLink> = links
        .iter()
        .filter_map(|(quality, payload)| match cipher::decode(payload) {
            Ok(url) => {
                let kind = if url.contains(".m3u8") { "hls" } else { "mp4" };
                Some(VibixLink {
                    quality: quality.clone(),
                    url,
                    kind: kind.to_string(),
                })
            }
            Err(e) => {
                warn!(quality, error = %e, "vibix: undecodable link");
                None
            }
        })
        .collect();

    decoded.sort_by(|a, b| quality_prefix(&b.quality).cmp(&quality_prefix(&a.quality)));
    decoded
}

fn quality_prefix(label: &str) -> u32 {
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_conforming_embed_url() {
        let embed = parse_embed_url(
            "https://host.example/seria/123/deadbeef00112233deadbeef00112233/720p",
        )
        .unwrap();
        assert_eq!(embed.host, "host.example");
        assert_eq!(embed.kind, "seria");
        assert_eq!(embed.id, "123");
        assert_eq!(embed.hash, "deadbeef00112233deadbeef00112233");
        assert_eq!(embed.quality, "720p");
    }

    #[test]
    fn falls_back_to_permissive_parse() {
        // Hash shorter than the strict pattern allows.
        let embed = parse_embed_url("https://odd-host.example/movie/9/abc123/1080").unwrap();
        assert_eq!(embed.host, "odd-host.example");
        assert_eq!(embed.kind, "movie");
        assert_eq!(embed.id, "9");
        assert_eq!(embed.hash, "abc123");
        assert_eq!(embed.quality, "1080");
    }

    #[test]
    fn rejects_urls_without_enough_segments() {
        assert!(parse_embed_url("https://host.example/movie/9").is_none());
        assert!(parse_embed_url("not a url at all").is_none());
    }

    #[test]
    fn decoded_links_sort_by_numeric_quality_prefix() {
        let mut links = HashMap::new();
        links.insert(
            "720p".to_string(),
            cipher::encode("https://cdn.example/720.mp4"),
        );
        links.insert(
            "1080".to_string(),
            cipher::encode("https://cdn.example/1080.m3u8"),
        );
        links.insert(
            "480p".to_string(),
            cipher::encode("https://cdn.example/480.mp4"),
        );

        let decoded = decode_links(&links);
        let qualities: Vec<&str> = decoded.iter().map(|l| l.quality.as_str()).collect();
        assert_eq!(qualities, vec!["1080", "720p", "480p"]);
        assert_eq!(decoded[0].kind, "hls");
        assert_eq!(decoded[1].kind, "mp4");
    }

    #[test]
    fn undecodable_links_are_dropped_not_fatal() {
        let mut links = HashMap::new();
        links.insert("720p".to_string(), "!!garbage!!".to_string());
        links.insert(
            "360p".to_string(),
            cipher::encode("https://cdn.example/360.mp4"),
        );
        let decoded = decode_links(&links);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].quality, "360p");
    }
}

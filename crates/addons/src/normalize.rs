use providers::{Quality, StreamSource};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::stream::AddonStream;

static SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(tb|gb|mb)\b").unwrap()
});

/// Parses a human-readable size out of free text. Units convert decimally:
/// GB=1e9, MB=1e6, TB=1e12.
pub fn parse_size_text(text: &str) -> Option<u64> {
    let caps = SIZE_REGEX.captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    let multiplier = match caps[2].to_ascii_lowercase().as_str() {
        "tb" => 1e12,
        "gb" => 1e9,
        "mb" => 1e6,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

/// Normalizes one raw descriptor into a [`StreamSource`], or drops it when
/// it carries neither a playable URL nor an info hash.
pub fn normalize_stream(addon_name: &str, stream: &AddonStream) -> Option<StreamSource> {
    let text = stream.descriptive_text();
    let quality = Quality::from_label(&text);
    let size = stream.declared_size().or_else(|| parse_size_text(&text));

    match (&stream.url, &stream.info_hash) {
        (Some(url), _) if Url::parse(url).is_ok() => Some(
            StreamSource::direct(addon_name, url.clone(), quality)
                .with_translation(stream.title.clone().unwrap_or_default())
                .with_size(size),
        ),
        (None, Some(info_hash)) => Some(
            StreamSource::torrent(addon_name, info_hash.clone(), quality)
                .with_translation(stream.title.clone().unwrap_or_default())
                .with_size(size),
        ),
        _ => {
            debug!(addon = addon_name, "dropping descriptor without url or info hash");
            None
        }
    }
}

/// Aggregate ordering: quality descending, then size descending.
pub fn sort_sources(sources: &mut [StreamSource]) {
    sources.sort_by(|a, b| {
        b.quality
            .cmp(&a.quality)
            .then_with(|| b.size_bytes.unwrap_or(0).cmp(&a.size_bytes.unwrap_or(0)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(name: &str, url: Option<&str>, info_hash: Option<&str>) -> AddonStream {
        AddonStream {
            name: Some(name.to_string()),
            url: url.map(str::to_string),
            info_hash: info_hash.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn size_text_parses_with_decimal_units() {
        assert_eq!(parse_size_text("movie 1.5 GB rip"), Some(1_500_000_000));
        assert_eq!(parse_size_text("700MB"), Some(700_000_000));
        assert_eq!(parse_size_text("2 TB archive"), Some(2_000_000_000_000));
        assert_eq!(parse_size_text("no size here"), None);
    }

    #[test]
    fn declared_size_beats_text_size() {
        let mut s = stream("x 1080p 2GB", Some("https://cdn.example/a.mp4"), None);
        s.size = Some(123);
        let source = normalize_stream("addon", &s).unwrap();
        assert_eq!(source.size_bytes, Some(123));
    }

    #[test]
    fn info_hash_without_url_becomes_torrent() {
        let source =
            normalize_stream("addon", &stream("rip 720p", None, Some("deadbeef"))).unwrap();
        assert!(source.is_torrent);
        assert_eq!(source.info_hash.as_deref(), Some("deadbeef"));
        assert_eq!(source.quality, Quality::Q720);
        assert!(source.url.is_none());
    }

    #[test]
    fn descriptor_without_url_or_hash_is_dropped() {
        assert!(normalize_stream("addon", &stream("nothing", None, None)).is_none());
    }

    #[test]
    fn relative_urls_are_rejected() {
        assert!(normalize_stream("addon", &stream("x", Some("/relative/path.mp4"), None)).is_none());
    }

    #[test]
    fn sort_is_quality_then_size_descending() {
        let mut sources = vec![
            normalize_stream("a", &stream("720p 1GB", Some("https://e/1"), None)).unwrap(),
            normalize_stream("a", &stream("1080p 1GB", Some("https://e/2"), None)).unwrap(),
            normalize_stream("a", &stream("1080p 3GB", Some("https://e/3"), None)).unwrap(),
        ];
        sort_sources(&mut sources);
        let urls: Vec<&str> = sources.iter().map(|s| s.url.as_deref().unwrap()).collect();
        assert_eq!(urls, vec!["https://e/3", "https://e/2", "https://e/1"]);
    }
}

use providers::ContentRef;
use serde::{Deserialize, Serialize};

/// Third-party-hosted manifest declaring what an addon exposes. Fetched
/// once at configuration time and carried alongside the transport URL.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddonManifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Resource kinds the addon claims to serve ("stream", "catalog", ..).
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// One enabled addon: its base transport URL plus its manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonDescriptor {
    pub name: String,
    pub transport_url: String,
    #[serde(default)]
    pub manifest: AddonManifest,
}

impl AddonDescriptor {
    /// Endpoint for one content reference, addon-protocol shaped:
    /// `{transport}/stream/{type}/{id}.json`.
    pub fn stream_url(&self, kind: &str, id: &str) -> String {
        format!(
            "{}/stream/{}/{}.json",
            self.transport_url.trim_end_matches('/'),
            kind,
            id
        )
    }
}

/// Encodes a content reference as the addon protocol's id scheme: the
/// catalog id directly for movies, `id:season:episode` for series.
pub fn addon_content_id(content: &ContentRef) -> (String, String) {
    match (content.season, content.episode) {
        (Some(season), Some(episode)) => (
            "series".to_string(),
            format!("{}:{}:{}", content.catalog_id, season, episode),
        ),
        _ => ("movie".to_string(), content.catalog_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_id_is_catalog_id() {
        let (kind, id) = addon_content_id(&ContentRef::movie(603));
        assert_eq!(kind, "movie");
        assert_eq!(id, "603");
    }

    #[test]
    fn series_id_carries_season_and_episode() {
        let (kind, id) = addon_content_id(&ContentRef::episode(1399, 2, 7));
        assert_eq!(kind, "series");
        assert_eq!(id, "1399:2:7");
    }

    #[test]
    fn stream_url_strips_trailing_slash() {
        let addon = AddonDescriptor {
            name: "main".to_string(),
            transport_url: "https://addon.example/".to_string(),
            manifest: AddonManifest::default(),
        };
        assert_eq!(
            addon.stream_url("movie", "603"),
            "https://addon.example/stream/movie/603.json"
        );
    }
}

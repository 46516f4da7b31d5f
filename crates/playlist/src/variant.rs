use m3u8_rs::Playlist;
use url::Url;

use crate::error::PlaylistError;

/// One master-manifest variant in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistVariant {
    pub bandwidth: u64,
    pub url: String,
}

/// Selects the media manifest to use for a master-or-media input.
///
/// Returns `Some(variant)` with the numerically greatest declared bandwidth
/// (ties broken by first occurrence) when the body is a master manifest,
/// `None` when it carries no variant directives and is already a media
/// manifest.
pub fn select_variant(body: &str, manifest_url: &str) -> Result<Option<PlaylistVariant>, PlaylistError> {
    let base = Url::parse(manifest_url)?;
    let playlist = m3u8_rs::parse_playlist_res(body.as_bytes())
        .map_err(|e| PlaylistError::ParseFailure(e.to_string()))?;

    let master = match playlist {
        Playlist::MasterPlaylist(master) => master,
        Playlist::MediaPlaylist(_) => return Ok(None),
    };

    let mut best: Option<PlaylistVariant> = None;
    for variant in &master.variants {
        let absolute = base
            .join(&variant.uri)
            .map_err(|e| PlaylistError::ParseFailure(format!("variant uri: {e}")))?;
        let candidate = PlaylistVariant {
            bandwidth: variant.bandwidth,
            url: absolute.to_string(),
        };
        // Strictly-greater comparison keeps the first occurrence on ties.
        match &best {
            Some(current) if candidate.bandwidth <= current.bandwidth => {}
            _ => best = Some(candidate),
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
        low/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=3000000,RESOLUTION=1920x1080\n\
        high/index.m3u8\n";

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:6\n\
        #EXTINF:6.0,\n\
        seg0.ts\n\
        #EXTINF:6.0,\n\
        seg1.ts\n\
        #EXT-X-ENDLIST\n";

    #[test]
    fn picks_greatest_bandwidth() {
        let variant = select_variant(MASTER, "https://cdn.example/v/master.m3u8")
            .unwrap()
            .unwrap();
        assert_eq!(variant.bandwidth, 3000000);
        assert_eq!(variant.url, "https://cdn.example/v/high/index.m3u8");
    }

    #[test]
    fn media_manifest_yields_none() {
        assert!(
            select_variant(MEDIA, "https://cdn.example/v/index.m3u8")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn bandwidth_tie_keeps_first_occurrence() {
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1000000\n\
            first.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1000000\n\
            second.m3u8\n";
        let variant = select_variant(master, "https://cdn.example/master.m3u8")
            .unwrap()
            .unwrap();
        assert_eq!(variant.url, "https://cdn.example/first.m3u8");
    }

    #[test]
    fn absolute_variant_uris_are_preserved() {
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=500000\n\
            https://other.example/stream.m3u8\n";
        let variant = select_variant(master, "https://cdn.example/master.m3u8")
            .unwrap()
            .unwrap();
        assert_eq!(variant.url, "https://other.example/stream.m3u8");
    }
}

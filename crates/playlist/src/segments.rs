use url::Url;

use crate::error::PlaylistError;

/// One segment reference. Index order must be preserved end-to-end even
/// when fetches complete out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    pub index: usize,
    pub url: String,
}

/// Extracts the ordered segment list from a media manifest: every
/// non-comment, non-blank line, resolved against the manifest's own base.
pub fn list_segments(body: &str, manifest_url: &str) -> Result<Vec<SegmentRef>, PlaylistError> {
    let base = Url::parse(manifest_url)?;
    let mut segments = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let absolute = base
            .join(line)
            .map_err(|e| PlaylistError::ParseFailure(format!("segment uri {line}: {e}")))?;
        segments.push(SegmentRef {
            index: segments.len(),
            url: absolute.to_string(),
        });
    }

    if segments.is_empty() {
        return Err(PlaylistError::NoSegments);
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_segments_in_manifest_order() {
        let media = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:6\n\
            #EXTINF:6.0,\n\
            seg0.ts\n\
            #EXTINF:6.0,\n\
            sub/seg1.ts\n\
            #EXTINF:6.0,\n\
            https://other.example/seg2.ts\n\
            #EXT-X-ENDLIST\n";
        let segments = list_segments(media, "https://cdn.example/v/index.m3u8").unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[0].url, "https://cdn.example/v/seg0.ts");
        assert_eq!(segments[1].url, "https://cdn.example/v/sub/seg1.ts");
        assert_eq!(segments[2].url, "https://other.example/seg2.ts");
    }

    #[test]
    fn comment_only_manifest_is_an_error() {
        let err = list_segments("#EXTM3U\n#EXT-X-ENDLIST\n", "https://cdn.example/i.m3u8");
        assert!(matches!(err, Err(PlaylistError::NoSegments)));
    }
}

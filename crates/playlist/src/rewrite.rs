use url::Url;

use crate::error::PlaylistError;

/// Proxy endpoint bases the rewrite routes URLs through. `public_base` is
/// this server as clients reach it, e.g. `https://reelio.example`.
#[derive(Debug, Clone)]
pub struct ProxyUrls {
    public_base: String,
}

impl ProxyUrls {
    pub fn new<S: Into<String>>(public_base: S) -> Self {
        Self {
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Proxied URL for a nested manifest.
    pub fn manifest_url(&self, absolute: &str) -> String {
        format!(
            "{}/proxy/manifest?url={}",
            self.public_base,
            urlencoding::encode(absolute)
        )
    }

    /// Proxied URL for a segment, key or any other non-manifest resource.
    pub fn segment_url(&self, absolute: &str) -> String {
        format!(
            "{}/proxy/segment?url={}",
            self.public_base,
            urlencoding::encode(absolute)
        )
    }

    /// Routes by extension: nested manifests go back through the manifest
    /// proxy, everything else through the segment proxy.
    pub fn route(&self, absolute: &str) -> String {
        if is_manifest_ref(absolute) {
            self.manifest_url(absolute)
        } else {
            self.segment_url(absolute)
        }
    }
}

fn is_manifest_ref(url: &str) -> bool {
    let path_end = url.find('?').unwrap_or(url.len());
    url[..path_end].ends_with(".m3u8")
}

/// Rewrites a fetched manifest so every referenced URL routes back through
/// this system.
///
/// Line classes:
/// - blank lines pass through;
/// - directive lines carrying `URI="..."` (keys, maps, subtitles) have the
///   quoted URI absolutized and replaced with a proxied URL;
/// - other directive lines pass through;
/// - remaining lines are referenced manifests or segments, absolutized and
///   replaced the same way.
pub fn rewrite_manifest(
    body: &str,
    manifest_url: &str,
    proxy: &ProxyUrls,
) -> Result<String, PlaylistError> {
    let base = Url::parse(manifest_url)?;
    let mut out = String::with_capacity(body.len() * 2);

    for line in body.lines() {
        if line.trim().is_empty() {
            out.push_str(line);
        } else if line.starts_with('#') {
            match rewrite_uri_attribute(line, &base, proxy) {
                Some(rewritten) => out.push_str(&rewritten),
                None => out.push_str(line),
            }
        } else {
            let absolute = base
                .join(line.trim())
                .map_err(|e| PlaylistError::ParseFailure(format!("ref uri {line}: {e}")))?;
            out.push_str(&proxy.route(absolute.as_str()));
        }
        out.push('\n');
    }
    Ok(out)
}

/// Replaces the quoted value of a `URI="..."` attribute, if the directive
/// carries one.
fn rewrite_uri_attribute(line: &str, base: &Url, proxy: &ProxyUrls) -> Option<String> {
    let attr_pos = line.find("URI=\"")?;
    let value_start = attr_pos + "URI=\"".len();
    let value_len = line[value_start..].find('"')?;
    let value = &line[value_start..value_start + value_len];

    let absolute = base.join(value).ok()?;
    let proxied = proxy.route(absolute.as_str());

    let mut rewritten = String::with_capacity(line.len() + proxied.len());
    rewritten.push_str(&line[..value_start]);
    rewritten.push_str(&proxied);
    rewritten.push_str(&line[value_start + value_len..]);
    Some(rewritten)
}

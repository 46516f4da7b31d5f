use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: String,
}

/// Fetches an upstream manifest with the spoofed header set and rewrites
/// every referenced URL back through this server.
pub async fn manifest(
    State(state): State<SharedState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let bundle = state.config.headers_for_upstream(&query.url);
    let response = state
        .http
        .get(&query.url)
        .headers(bundle.to_header_map())
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!(
            "manifest fetch returned {status} for {}",
            query.url
        )));
    }
    let body = response.text().await?;
    let rewritten = playlist::rewrite_manifest(&body, &query.url, &state.proxy)?;
    debug!(url = %query.url, bytes = rewritten.len(), "manifest rewritten");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")
        // Media playlists rotate; a cached copy serves stale segment URLs.
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(rewritten))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Streams an upstream segment (or key, or init section) through
/// unmodified. `Range` is forwarded so players can seek; the range
/// response headers are mirrored back.
pub async fn segment(
    State(state): State<SharedState>,
    Query(query): Query<ProxyQuery>,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let bundle = state.config.headers_for_upstream(&query.url);
    let mut upstream = state
        .http
        .get(&query.url)
        .headers(bundle.to_header_map());
    if let Some(range) = request_headers.get(header::RANGE) {
        upstream = upstream.header(header::RANGE, range.clone());
    }

    let response = upstream.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!(
            "segment fetch returned {status} for {}",
            query.url
        )));
    }

    let mut builder = Response::builder().status(status.as_u16());
    for name in [
        header::CONTENT_RANGE,
        header::ACCEPT_RANGES,
        header::CONTENT_LENGTH,
        header::CONTENT_TYPE,
    ] {
        if let Some(value) = response.headers().get(&name) {
            builder = builder.header(name, value.clone());
        }
    }
    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

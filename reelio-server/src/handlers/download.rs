use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use futures::stream;
use providers::media::ContentRef;
use segio::{HttpSegmentFetch, ServerPipeline};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::resolve_source;
use crate::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Direct case: proxy this URL as an attachment.
    pub url: Option<String>,
    /// Segmented case: resolve this content and remux server-side.
    pub id: Option<u64>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub audio: Option<usize>,
    pub filename: Option<String>,
}

pub async fn download(
    State(state): State<SharedState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    match (&query.url, query.id) {
        (Some(url), _) => direct(&state, url, attachment_name(&query, "mp4")).await,
        (None, Some(id)) => {
            let content = ContentRef {
                catalog_id: id,
                season: query.season,
                episode: query.episode,
                audio_index: query.audio,
            };
            remux(&state, &content, attachment_name(&query, "mp4")).await
        }
        (None, None) => Err(ApiError::BadRequest(
            "either url or id must be given".to_string(),
        )),
    }
}

/// Streams a single upstream file through with an attachment disposition.
async fn direct(state: &SharedState, url: &str, filename: String) -> Result<Response, ApiError> {
    let bundle = state.config.headers_for_upstream(url);
    let response = state
        .http
        .get(url)
        .headers(bundle.to_header_map())
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!(
            "download fetch returned {status} for {url}"
        )));
    }

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header(header::CONTENT_TYPE, "application/octet-stream");
    if let Some(length) = response.headers().get(header::CONTENT_LENGTH) {
        builder = builder.header(header::CONTENT_LENGTH, length.clone());
    }
    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Resolves the content's manifest and streams the ffmpeg remux output as
/// it is produced. Errors after the first byte terminate the stream.
async fn remux(
    state: &SharedState,
    content: &ContentRef,
    filename: String,
) -> Result<Response, ApiError> {
    let resolved = resolve_source(state, content).await;
    let Some(hls) = resolved.hls else {
        return Err(ApiError::NoStreams);
    };

    let bundle = state.config.headers_for_upstream(&hls);
    let fetcher = HttpSegmentFetch::new(
        state.http.clone(),
        bundle.to_header_map(),
        state.pipeline.request_timeout,
    );
    let pipeline = ServerPipeline::new(Arc::new(fetcher), state.pipeline.clone());
    debug!(id = content.catalog_id, manifest = %hls, "starting server remux");

    let rx = pipeline
        .stream_remux(&hls, CancellationToken::new())
        .await?;
    let body = Body::from_stream(stream::unfold(rx, |mut rx| async {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Strips anything that could escape the quoted disposition value or the
/// local filesystem path.
fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | '"' | '\0'..='\x1f' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.').to_string();
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed
    }
}

fn attachment_name(query: &DownloadQuery, extension: &str) -> String {
    match &query.filename {
        Some(name) => sanitize_filename(name),
        None => match (query.id, query.season, query.episode) {
            (Some(id), Some(season), Some(episode)) => {
                format!("{id}_s{season:02}e{episode:02}.{extension}")
            }
            (Some(id), _, _) => format!("{id}.{extension}"),
            _ => format!("download.{extension}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_cannot_escape_the_disposition_quotes() {
        assert_eq!(sanitize_filename("movie \"x\".mp4"), "movie _x_.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("  "), "download");
    }

    #[test]
    fn default_names_follow_the_content_reference() {
        let query = DownloadQuery {
            url: None,
            id: Some(99),
            season: Some(1),
            episode: Some(4),
            audio: None,
            filename: None,
        };
        assert_eq!(attachment_name(&query, "mp4"), "99_s01e04.mp4");
    }
}

use std::time::Duration;

use addons::{HttpStreamFetcher, aggregate_streams};
use axum::Json;
use axum::extract::{Query, State};
use providers::media::StreamSource;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct AddonQuery {
    /// Restrict to one configured addon by name; all of them otherwise.
    pub addon: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct AddonStreamsResponse {
    pub streams: Vec<StreamSource>,
}

pub async fn stream(
    State(state): State<SharedState>,
    Query(query): Query<AddonQuery>,
) -> Result<Json<AddonStreamsResponse>, ApiError> {
    let selected: Vec<_> = state
        .config
        .addons
        .iter()
        .filter(|a| query.addon.as_ref().is_none_or(|name| &a.name == name))
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(ApiError::BadRequest(match query.addon {
            Some(name) => format!("no configured addon named {name}"),
            None => "no addons configured".to_string(),
        }));
    }

    let fetcher = HttpStreamFetcher::new(state.http.clone());
    let streams = aggregate_streams(
        &fetcher,
        &selected,
        &query.kind,
        &query.id,
        Duration::from_secs(state.config.addon_timeout_secs),
    )
    .await;
    Ok(Json(AddonStreamsResponse { streams }))
}

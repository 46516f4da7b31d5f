use axum::Json;
use axum::extract::State;
use providers::providers::vibix::{Vibix, VibixLink, parse_embed_url};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub links: Vec<VibixLink>,
}

/// Resolves a vibix embed URL to its decoded link list.
pub async fn parse(
    State(state): State<SharedState>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, ApiError> {
    if parse_embed_url(&request.url).is_none() {
        return Err(ApiError::BadRequest(format!(
            "not a recognizable embed url: {}",
            request.url
        )));
    }

    let vibix = Vibix::new(state.http.clone(), &state.config.vibix.headers);
    let links = vibix.resolve(&request.url).await;
    if links.is_empty() {
        return Err(ApiError::NoStreams);
    }
    Ok(Json(ParseResponse { links }))
}

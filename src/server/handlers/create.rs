use crate::{
    codec,
    error::{Result, StitchError},
    model::StitchInstruction,
    server::state::AppState,
};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::info;

/// Accept a stitch instruction and answer with the master playlist URI
/// that carries it.
///
/// The body is re-encoded exactly as the client sent it (key order
/// included), so equal requests always produce equal tokens.
pub async fn create_stitch(State(state): State<AppState>, body: String) -> Result<Response> {
    let start = Instant::now();
    let result = create(&state, &body);
    super::observe("create", start, result)
}

fn create(state: &AppState, body: &str) -> Result<Response> {
    if body.trim().is_empty() {
        return Err(StitchError::Validation("Missing request body".to_string()));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| StitchError::Validation(format!("Invalid JSON in request body: {}", e)))?;

    if value
        .get("uri")
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
        .is_none()
    {
        return Err(StitchError::Validation("Missing uri in payload".to_string()));
    }

    let instruction: StitchInstruction = serde_json::from_value(value.clone())
        .map_err(|e| StitchError::Validation(format!("Invalid stitch request: {}", e)))?;

    let token = codec::encode(&value)?;
    info!(
        "Created stitch request for {} with {} breaks",
        instruction.uri,
        instruction.breaks.len()
    );

    let uri = format!("{}/master.m3u8?payload={}", state.config.prefix, token);
    Ok(Json(json!({ "uri": uri })).into_response())
}

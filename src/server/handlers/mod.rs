pub mod asset_list;
pub mod cors;
pub mod create;
pub mod health;
pub mod playlist;

use crate::{error::Result, metrics};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::time::Instant;

/// Content type of every playlist response
pub const MPEGURL: &str = "application/vnd.apple.mpegurl";

/// Record the outcome of a handler under `endpoint` and pass it through
fn observe<T>(endpoint: &'static str, start: Instant, result: Result<T>) -> Result<T> {
    let status = match &result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    };
    metrics::record_request(endpoint, status);
    metrics::record_duration(endpoint, start);
    result
}

fn playlist_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, MPEGURL)], body).into_response()
}

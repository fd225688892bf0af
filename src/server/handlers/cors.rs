//! CORS for browser players: every response is readable cross-origin and
//! preflights under the route prefix are answered directly.

use crate::server::state::AppState;
use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

const ALLOW_METHODS: &str = "POST, GET, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Origin";
const MAX_AGE: &str = "86400";

/// Header carrying the service version on every response
pub const VERSION_HEADER: &str = "x-vodstitch-version";

/// Answer a CORS preflight
pub async fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
            (header::ACCESS_CONTROL_MAX_AGE, MAX_AGE),
        ],
    )
        .into_response()
}

/// Response middleware adding the allow-origin and version headers
pub async fn decorate(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static(VERSION_HEADER),
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Unmatched routes: preflight anything under the prefix, 404 otherwise
pub async fn fallback(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method == Method::OPTIONS && uri.path().starts_with(state.config.prefix.as_str()) {
        return preflight().await;
    }
    StatusCode::NOT_FOUND.into_response()
}

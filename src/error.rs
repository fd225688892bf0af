use crate::codec::CodecError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, StitchError>;

/// Everything that can abort a stitching request.
///
/// Client-side problems (bad body, bad token, disallowed origin) surface as
/// 400 with a short reason. Upstream and splicing failures surface as 500
/// with a generic reason; the detail only goes to the log.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid payload in request: {0}")]
    Decode(#[from] CodecError),

    #[error("Origin not allowed: {0}")]
    InvalidOrigin(String),

    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(#[from] reqwest::Error),

    #[error("Failed to parse playlist: {0}")]
    PlaylistParse(String),

    #[error("Splicing failed: {0}")]
    Splicing(String),
}

impl StitchError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            StitchError::Validation(_) | StitchError::Decode(_) | StitchError::InvalidOrigin(_) => {
                StatusCode::BAD_REQUEST
            }
            StitchError::UpstreamFetch(_)
            | StitchError::PlaylistParse(_)
            | StitchError::Splicing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Reason string that is safe to hand to the client
    fn public_reason(&self) -> String {
        match self {
            StitchError::Validation(msg) => msg.clone(),
            StitchError::Decode(_) => "Invalid payload in request".to_string(),
            StitchError::InvalidOrigin(msg) => msg.clone(),
            StitchError::UpstreamFetch(_)
            | StitchError::PlaylistParse(_)
            | StitchError::Splicing(_) => "Failed to generate manifest".to_string(),
        }
    }
}

impl IntoResponse for StitchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "reason": self.public_reason() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(
            StitchError::Validation("Missing uri in payload".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StitchError::InvalidOrigin("nope".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn server_errors_map_to_500() {
        assert_eq!(
            StitchError::Splicing("no variants".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StitchError::PlaylistParse("garbage".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn server_error_detail_is_not_leaked() {
        let resp = StitchError::Splicing("secret upstream detail".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert!(!text.contains("secret"), "leaked detail: {}", text);
        assert!(text.contains("Failed to generate manifest"));
    }

    #[tokio::test]
    async fn validation_reason_is_returned() {
        let resp = StitchError::Validation("Missing request body".into()).into_response();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["reason"], "Missing request body");
    }
}

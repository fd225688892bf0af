use crate::{error::Result, stitcher::asset_list};
use axum::{
    Json,
    extract::Path,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::info;

/// Serve the asset-list document packed into `token`.
///
/// The token is the whole rest of the path, so unescaped base64 with `/` in
/// it is accepted as well as the escaped form this service generates.
pub async fn serve_asset_list(Path(token): Path<String>) -> Result<Response> {
    let start = Instant::now();
    info!("Serving asset list ({} byte token)", token.len());

    let result = asset_list::decode(&token)
        .map(|doc| Json(doc).into_response())
        .map_err(Into::into);
    super::observe("assetlist", start, result)
}

pub mod handlers;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use handlers::{asset_list, cors, create, health, playlist};
use state::AppState;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router with every route, the CORS response middleware and
/// request tracing.
pub fn build_router(config: Config) -> Result<Router, reqwest::Error> {
    let state = AppState::new(config)?;
    let prefix = state.config.prefix.clone();

    let create_route = post(create::create_stitch).options(cors::preflight);

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route(
            &format!("{}/master.m3u8", prefix),
            get(playlist::serve_master).options(cors::preflight),
        )
        .route(
            &format!("{}/media.m3u8", prefix),
            get(playlist::serve_media).options(cors::preflight),
        )
        .route(
            &format!("{}/audio.m3u8", prefix),
            get(playlist::serve_audio).options(cors::preflight),
        )
        .route(
            &format!("{}/assetlist/{{*token}}", prefix),
            get(asset_list::serve_asset_list).options(cors::preflight),
        );

    router = if prefix.is_empty() {
        router.route("/", create_route.get(health::root))
    } else {
        router
            .route("/", get(health::root))
            .route(&prefix, create_route.clone())
            .route(&format!("{}/", prefix), create_route)
    };

    Ok(router
        .fallback(cors::fallback)
        .layer(middleware::map_response(cors::decorate))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);
    let prefix = config.prefix.clone();

    let app = build_router(config)?;

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{} (prefix {:?})", addr, prefix);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

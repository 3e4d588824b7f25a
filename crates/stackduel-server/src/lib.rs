pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod executor;
pub mod game;
pub mod game_loop;
pub mod health;
pub mod room;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::{BoxError, Router};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let http_timeout = Duration::from_secs(config.limits.http_timeout_secs);
    let state = AppState::new(config);

    // REST routes get the request timeout; the socket route must not.
    let rest_routes = Router::new()
        .route(
            "/rooms",
            get(api::list_rooms).post(api::create_or_join_room),
        )
        .route("/healthcheck", get(health::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(http_timeout)),
        )
        .layer(CorsLayer::permissive());

    let app = Router::new()
        .route("/ws/match", get(ws::ws_handler))
        .merge(rest_routes)
        .with_state(state.clone());

    (app, state)
}

async fn handle_middleware_error(err: BoxError) -> impl IntoResponse {
    let status = if err.is::<tower::timeout::error::Elapsed>() {
        StatusCode::REQUEST_TIMEOUT
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_lowercase();
    (status, Json(serde_json::json!({ "error": message })))
}

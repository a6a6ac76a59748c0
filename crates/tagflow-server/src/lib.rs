pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(root: PathBuf) -> Router {
    let app_state = state::AppState::new(root);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Runs
        .route("/api/runs", post(routes::runs::create_run))
        .route("/api/runs", get(routes::runs::list_runs))
        .route("/api/runs/{id}", get(routes::runs::get_run))
        // Resolve
        .route("/api/resolve", post(routes::resolve::resolve))
        // Fleet
        .route("/api/fleet", get(routes::fleet::get_fleet))
        // Config
        .route("/api/config", get(routes::config::get_config))
        // Health
        .route("/api/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the HTTP trigger on a pre-bound listener.
///
/// Lets the caller read the actual port before starting, which matters when
/// `port = 0` and the OS picks a free one.
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root);

    tracing::info!("tagflow listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}

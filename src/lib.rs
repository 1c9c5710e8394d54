pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::state::AppState;

/// Builds the router with tracing and CORS layers applied.
pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app() -> axum::Router {
    let config = Config::from_env();
    let db_proxy = match db::DatabaseProxy::from_env().await {
        Ok(proxy) => Some(Arc::new(proxy)),
        Err(err) => {
            tracing::warn!(error = %err, "database proxy not initialized");
            None
        }
    };

    let progress = AppState::create_progress_service(db_proxy.clone(), config.mock_fallback);
    app(AppState::new(db_proxy, progress))
}

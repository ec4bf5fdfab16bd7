pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::Database;
use crate::state::{AppState, ProviderSet};

/// Builds the application from the environment. Used by `main` and by
/// integration tests that exercise the real providers.
pub async fn create_app() -> Result<axum::Router, db::DbInitError> {
    let config = Config::from_env();
    let db = Database::open(&config.database_path).await?;
    let providers = ProviderSet::from_env(&config.temp_dir);
    Ok(build_app(AppState::new(db, providers, config.temp_dir)))
}

/// Router over an already-constructed state; tests inject fake providers
/// and an in-memory database here.
pub fn build_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

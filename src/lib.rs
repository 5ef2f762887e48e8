//! PDF Preview Server
//!
//! Browser upload of PDF files with per-page PNG previews. Each browser
//! session owns a directory of uploads, previews and a JSON record file that
//! the dashboard follows over Server-Sent Events.
//!
//! # Modules
//!
//! - `ident`: random alphanumeric identifiers
//! - `store`: session directories and record files
//! - `render`: rasterization and metadata extraction
//! - `events`: change detection for the record file
//! - `routes`: HTTP handlers

pub mod assets;
pub mod config;
pub mod error;
pub mod events;
pub mod ident;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, ShutdownHandle};

/// Build the router with all middleware and routes.
pub fn create_app(state: AppState) -> Router {
    let config = state.config();

    // Routes that belong to a session
    let session_routes = Router::new()
        .route("/events", get(routes::events::stream_events))
        .route(
            "/upload",
            post(routes::upload::upload_pdfs)
                .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes)),
        )
        .layer(from_fn(session::session_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::pages::dashboard))
        .route("/id", get(routes::pages::debug_id))
        .route("/health", get(routes::pages::health_check))
        .route("/static/*path", get(routes::pages::static_file))
        .nest_service(
            &format!("/{}", store::ARTIFACTS_MOUNT),
            ServeDir::new(&config.storage.artifacts_dir),
        )
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

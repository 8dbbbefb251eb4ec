//! Unified API router for intake-connect.
//!
//! Mounts all endpoint groups under /v1/:
//! - /v1/oauth       — Handshake start + callback per provider
//! - /v1/connections — Connection status for the dashboard
//! - /v1/cases       — Case-management search
//! - /v1/clients     — Client-contact search
//! - /v1/drive       — Folder listing + document upload
//! - /v1/status      — Health check

pub mod routes;

use crate::SharedState;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Largest multipart body accepted, sized for scanned filings (25 MiB).
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/v1", routes::v1_router(state))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

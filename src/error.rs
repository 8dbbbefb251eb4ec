use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the intake-connect service.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    // ── Request / session errors ────────────────────────────────────────
    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Callback state parameter missing, unverifiable, or expired.
    /// Always fails closed: no subject is ever guessed from a bad state.
    #[error("Invalid or expired authorization state")]
    InvalidSession,

    // ── Token lifecycle errors ──────────────────────────────────────────
    #[error("{provider} is not connected for {subject}")]
    NotConnected { provider: String, subject: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    /// The authority redirected back with `error=` (user cancelled or
    /// consent was denied).
    #[error("Authorization denied: {0}")]
    ProviderDenied(String),

    // ── Upstream errors ─────────────────────────────────────────────────
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider {0} not found")]
    ProviderNotFound(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ConnectError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        ConnectError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for ConnectError {
    fn from(e: anyhow::Error) -> Self {
        ConnectError::Internal(e.to_string())
    }
}

impl IntoResponse for ConnectError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ConnectError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ConnectError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ConnectError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ConnectError::InvalidSession => (StatusCode::BAD_REQUEST, "invalid_session"),
            ConnectError::NotConnected { .. } => (StatusCode::NOT_FOUND, "not_connected"),
            ConnectError::RefreshFailed(_) => (StatusCode::BAD_GATEWAY, "refresh_failed"),
            ConnectError::ExchangeFailed(_) => (StatusCode::BAD_GATEWAY, "exchange_failed"),
            ConnectError::ProviderDenied(_) => (StatusCode::BAD_REQUEST, "provider_denied"),
            ConnectError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            ConnectError::ProviderNotFound(_) => (StatusCode::NOT_FOUND, "provider_not_found"),
            ConnectError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ConnectError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            ConnectError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

//! API route handlers for the intake-connect service.
//!
//! All handlers receive `SharedState` via Axum state extraction. Every
//! endpoint except `/status` and the OAuth callback requires the intake
//! app's shared secret; the callback is reached by the staff member's
//! browser and authenticates through the signed `state` parameter instead.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{require_staff, StaffContext};
use crate::error::ConnectError;
use crate::store::{Subject, TokenRecord};
use crate::tokens::DEFAULT_EXPIRES_IN_SECS;
use crate::SharedState;

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── OAuth handshake ──────────────────────────────────────────────
        .route("/oauth/start/{provider}", get(oauth_start))
        .route("/oauth/callback/{provider}", get(oauth_callback))
        // ── Connections ──────────────────────────────────────────────────
        .route("/connections", get(connections))
        // ── Case management ──────────────────────────────────────────────
        .route("/cases/search", get(cases_search))
        .route("/clients/search", get(clients_search))
        // ── Document drive ───────────────────────────────────────────────
        .route("/drive/folders", get(drive_folders))
        .route("/drive/files", post(drive_upload))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "intake-connect",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Subjects
// =============================================================================

/// The case-management platform is connected once for the whole office;
/// every other integration belongs to the requesting staff member.
fn subject_for(provider_id: &str, staff: &StaffContext) -> Subject {
    match provider_id {
        "cases" => Subject::Office,
        _ => staff.subject(),
    }
}

// =============================================================================
// OAuth Handshake
// =============================================================================

/// GET /v1/oauth/start/:provider — Initiate an OAuth flow.
///
/// Requires staff identity so the connection lands under the right subject.
/// Responds with a redirect to the authority's consent page carrying a
/// signed state parameter.
async fn oauth_start(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(provider_id): Path<String>,
) -> Result<Response, ConnectError> {
    let staff = require_staff(&headers, &state.config.internal_secret)?;

    let provider = state
        .registry
        .get(&provider_id)
        .ok_or_else(|| ConnectError::ProviderNotFound(provider_id.clone()))?;

    // Build state parameter: provider:subject:timestamp
    let subject = subject_for(&provider_id, &staff);
    let timestamp = chrono::Utc::now().timestamp();
    let state_data = format!("{}:{}:{}", provider_id, subject, timestamp);
    let signed_state = state.crypto.sign_state(&state_data)?;

    let callback_url = state.config.callback_url(&provider_id);
    let auth_url = provider.auth_url(&signed_state, &callback_url);

    Ok(Redirect::temporary(&auth_url).into_response())
}

#[derive(Deserialize)]
struct OAuthCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /v1/oauth/callback/:provider — Handle the authority's redirect back.
///
/// The signed state is the only trusted carrier of subject identity, so it
/// is checked before anything else. A callback without a verifiable state
/// never reaches the store, whatever else the query string claims.
async fn oauth_callback(
    State(state): State<SharedState>,
    Path(provider_id): Path<String>,
    Query(q): Query<OAuthCallbackQuery>,
) -> Result<Response, ConnectError> {
    // Verify state signature
    let raw_state = q.state.as_deref().ok_or(ConnectError::InvalidSession)?;
    let state_data = state.crypto.verify_state(raw_state)?;

    // Parse state: provider:subject:timestamp. Staff subjects contain ':'
    // themselves, so split from both ends rather than collecting parts.
    let (state_provider, rest) = state_data
        .split_once(':')
        .ok_or(ConnectError::InvalidSession)?;
    let (subject_str, ts) = rest.rsplit_once(':').ok_or(ConnectError::InvalidSession)?;
    let timestamp: i64 = ts.parse().map_err(|_| ConnectError::InvalidSession)?;
    let subject = Subject::parse(subject_str).ok_or(ConnectError::InvalidSession)?;

    if state_provider != provider_id {
        return Err(ConnectError::InvalidSession);
    }

    // Check 10-minute expiry on state
    let now = chrono::Utc::now().timestamp();
    if now - timestamp > 600 {
        return Err(ConnectError::InvalidSession);
    }

    // The staff member declined consent, or the authority refused the
    // grant. Terminal: record the event and leave stored tokens alone.
    if let Some(err) = &q.error {
        let detail = q.error_description.clone().unwrap_or_else(|| err.clone());
        let _ = state
            .store
            .log_event(
                "oauth.denied",
                &provider_id,
                &subject,
                json!({ "error": err, "description": detail }),
            )
            .await;
        return Err(ConnectError::ProviderDenied(detail));
    }

    let code = q
        .code
        .as_deref()
        .ok_or_else(|| ConnectError::BadRequest("Missing authorization code".into()))?;

    // Exchange code for tokens
    let provider = state
        .registry
        .get(&provider_id)
        .ok_or_else(|| ConnectError::ProviderNotFound(provider_id.clone()))?;

    let callback_url = state.config.callback_url(&provider_id);
    let tokens = provider.exchange_code(code, &callback_url).await?;

    let now = chrono::Utc::now();
    let expires_in = tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let record = TokenRecord {
        provider: provider_id.clone(),
        subject: subject.clone(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
        scope: tokens.scope.unwrap_or_default(),
        expires_at: now + chrono::Duration::seconds(expires_in as i64),
        updated_at: now,
    };

    state.store.upsert(&record).await?;

    // Audit log
    let _ = state
        .store
        .log_event(
            "oauth.connected",
            &provider_id,
            &subject,
            json!({ "scope": record.scope }),
        )
        .await;

    // Back to the dashboard's connection settings
    let redirect_url = format!(
        "{}/settings/connections?connected={}",
        state.config.dashboard_url, provider_id
    );
    Ok(Redirect::temporary(&redirect_url).into_response())
}

// =============================================================================
// Connections
// =============================================================================

/// GET /v1/connections — Connection status per configured integration.
async fn connections(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ConnectError> {
    let staff = require_staff(&headers, &state.config.internal_secret)?;

    let statuses = state.store.list_status().await?;

    let data: Vec<serde_json::Value> = state
        .registry
        .ids()
        .into_iter()
        .map(|id| {
            let subject = subject_for(id, &staff);
            let status = statuses
                .iter()
                .find(|s| s.provider == id && s.subject == subject.to_string());
            json!({
                "provider": id,
                "display_name": state.registry.get(id).map(|p| p.display_name()),
                "subject": subject,
                "connected": status.is_some(),
                "scope": status.map(|s| &s.scope),
                "expires_at": status.map(|s| s.expires_at),
                "connected_at": status.map(|s| s.connected_at),
            })
        })
        .collect();

    Ok(Json(json!({ "data": data })))
}

// =============================================================================
// Case Management
// =============================================================================

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

/// GET /v1/cases/search — Search matters on the case-management platform.
async fn cases_search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ConnectError> {
    let _staff = require_staff(&headers, &state.config.internal_secret)?;

    let client = state
        .cases
        .as_ref()
        .ok_or_else(|| ConnectError::ProviderNotFound("cases".into()))?;

    let cases = client.search_cases(&query.q).await?;
    Ok(Json(json!({ "data": cases })))
}

/// GET /v1/clients/search — Search client contacts on the case-management platform.
async fn clients_search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ConnectError> {
    let _staff = require_staff(&headers, &state.config.internal_secret)?;

    let client = state
        .cases
        .as_ref()
        .ok_or_else(|| ConnectError::ProviderNotFound("cases".into()))?;

    let clients = client.search_clients(&query.q).await?;
    Ok(Json(json!({ "data": clients })))
}

// =============================================================================
// Document Drive
// =============================================================================

#[derive(Deserialize)]
struct FoldersQuery {
    parent_id: Option<String>,
}

/// GET /v1/drive/folders — List folders under a parent (root when omitted).
async fn drive_folders(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(q): Query<FoldersQuery>,
) -> Result<Json<serde_json::Value>, ConnectError> {
    let staff = require_staff(&headers, &state.config.internal_secret)?;

    let client = state
        .drive
        .as_ref()
        .ok_or_else(|| ConnectError::ProviderNotFound("drive".into()))?;

    let folders = client
        .list_folders(&staff.subject(), q.parent_id.as_deref())
        .await?;
    Ok(Json(json!({ "data": folders })))
}

/// POST /v1/drive/files — Upload a document into a drive folder.
///
/// Multipart body: a `folder_id` text field and a `file` field carrying
/// the document, whose filename is taken from the part headers.
async fn drive_upload(
    State(state): State<SharedState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ConnectError> {
    let staff = require_staff(&headers, &state.config.internal_secret)?;

    let client = state
        .drive
        .as_ref()
        .ok_or_else(|| ConnectError::ProviderNotFound("drive".into()))?;

    let mut folder_id: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ConnectError::BadRequest(format!("Multipart read error: {e}")))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("folder_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ConnectError::BadRequest(format!("Bad folder_id field: {e}")))?;
                folder_id = Some(value);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ConnectError::BadRequest(format!("Bad file field: {e}")))?;
                file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let folder_id =
        folder_id.ok_or_else(|| ConnectError::BadRequest("folder_id field required".into()))?;
    let (file_name, bytes) =
        file.ok_or_else(|| ConnectError::BadRequest("file field required".into()))?;

    let uploaded = client
        .upload_file(&staff.subject(), &folder_id, &file_name, bytes)
        .await?;

    // Audit log
    let _ = state
        .store
        .log_event(
            "drive.uploaded",
            "drive",
            &staff.subject(),
            json!({ "file_id": &uploaded.id, "name": &uploaded.name }),
        )
        .await;

    Ok(Json(json!({ "data": uploaded })))
}

//! OAuth handshake endpoints: start redirects, callback outcomes, and the
//! connections listing, end to end over the router.

mod support;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use intake_connect::crypto::CryptoEngine;
use intake_connect::store::{Subject, TokenStore};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{build_state, stored_record, test_engine, test_server, INTERNAL_SECRET, STAFF_ID};

fn with_staff(req: axum_test::TestRequest, staff_id: &'static str) -> axum_test::TestRequest {
    req.add_header(
        HeaderName::from_static("x-internal-secret"),
        HeaderValue::from_static(INTERNAL_SECRET),
    )
    .add_header(
        HeaderName::from_static("x-staff-id"),
        HeaderValue::from_static(staff_id),
    )
}

fn location(resp: &axum_test::TestResponse) -> String {
    resp.header("location")
        .to_str()
        .expect("location is ascii")
        .to_string()
}

/// A state parameter as the service itself would mint it.
fn signed_state(provider: &str, subject: &str, age_secs: i64) -> String {
    let timestamp = Utc::now().timestamp() - age_secs;
    test_engine()
        .sign_state(&format!("{provider}:{subject}:{timestamp}"))
        .expect("sign state")
}

// ── Status ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_service_health() {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state);

    let resp = server.get("/v1/status").await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "intake-connect");
}

// ── Start ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_redirects_to_authority_with_signed_state() {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state);

    let resp = with_staff(server.get("/v1/oauth/start/cases"), STAFF_ID).await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);

    let target = Url::parse(&location(&resp)).expect("valid redirect url");
    assert!(target.path().ends_with("/authorize"));

    let pairs: Vec<(String, String)> = target
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let param = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    };

    assert_eq!(param("client_id"), "client-id-123");
    assert_eq!(param("response_type"), "code");
    assert_eq!(
        param("redirect_uri"),
        "http://connect.test/v1/oauth/callback/cases"
    );

    // The state verifies under the service's own key and names the
    // office-wide subject for the cases platform.
    let payload = test_engine()
        .verify_state(param("state"))
        .expect("state verifies");
    assert!(payload.starts_with("cases:office:"), "payload: {payload}");
}

#[tokio::test]
async fn start_for_drive_binds_the_requesting_staff_member() {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state);

    let resp = with_staff(server.get("/v1/oauth/start/drive"), STAFF_ID).await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);

    let target = Url::parse(&location(&resp)).expect("valid redirect url");
    let state = target
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state param present");

    let payload = test_engine().verify_state(&state).expect("state verifies");
    assert!(
        payload.starts_with(&format!("drive:staff:{STAFF_ID}:")),
        "payload: {payload}"
    );
}

#[tokio::test]
async fn start_rejects_callers_without_the_shared_secret() {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state);

    let resp = server.get("/v1/oauth/start/cases").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server
        .get("/v1/oauth/start/cases")
        .add_header(
            HeaderName::from_static("x-internal-secret"),
            HeaderValue::from_static("not-the-secret"),
        )
        .add_header(
            HeaderName::from_static("x-staff-id"),
            HeaderValue::from_static(STAFF_ID),
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    // Secret alone is not enough: the subject needs a staff id.
    let resp = server
        .get("/v1/oauth/start/drive")
        .add_header(
            HeaderName::from_static("x-internal-secret"),
            HeaderValue::from_static(INTERNAL_SECRET),
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn start_with_unknown_provider_is_not_found() {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state);

    let resp = with_staff(server.get("/v1/oauth/start/calendar"), STAFF_ID).await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "provider_not_found");
}

// ── Callback ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn callback_exchanges_code_and_stores_the_connection() -> anyhow::Result<()> {
    let authority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-7"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2Fconnect.test%2Fv1%2Foauth%2Fcallback%2Fcases",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "refresh_token": "fresh-refresh-token",
            "token_type": "Bearer",
            "expires_in": 7200,
            "scope": "read write"
        })))
        .expect(1)
        .mount(&authority)
        .await;

    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state.clone());

    let before = Utc::now();
    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("code", "auth-code-7")
        .add_query_param("state", signed_state("cases", "office", 0))
        .await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&resp),
        "http://dashboard.test/settings/connections?connected=cases"
    );

    let stored = ctx.store.get("cases", &Subject::Office).await?;
    assert_eq!(stored.access_token, "fresh-access-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("fresh-refresh-token"));
    assert_eq!(stored.scope, "read write");
    assert!(stored.expires_at > before + chrono::Duration::seconds(7000));

    let events = ctx.store.events().await;
    assert!(events
        .iter()
        .any(|e| e.event_type == "oauth.connected" && e.provider == "cases"));

    authority.verify().await;
    Ok(())
}

#[tokio::test]
async fn reconnecting_replaces_the_stored_record() -> anyhow::Result<()> {
    let authority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "token_type": "Bearer",
            "expires_in": 7200
        })))
        .mount(&authority)
        .await;

    let ctx = build_state(&authority.uri(), &authority.uri());
    ctx.store
        .upsert(&stored_record("cases", Subject::Office, 3600))
        .await?;
    let server = test_server(ctx.state.clone());

    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("code", "auth-code-8")
        .add_query_param("state", signed_state("cases", "office", 0))
        .await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);

    // The re-issued grant came back without a refresh token, and that is
    // what the record now says: the old row was replaced, not merged.
    let stored = ctx.store.get("cases", &Subject::Office).await?;
    assert_eq!(stored.access_token, "fresh-access-token");
    assert_eq!(stored.refresh_token, None);
    Ok(())
}

#[tokio::test]
async fn callback_denial_is_terminal_without_mutation() {
    let authority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&authority)
        .await;

    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state.clone());

    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("error", "access_denied")
        .add_query_param("error_description", "Staff member declined")
        .add_query_param("state", signed_state("cases", "office", 0))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "provider_denied");

    let err = ctx
        .store
        .get("cases", &Subject::Office)
        .await
        .expect_err("nothing was stored");
    assert!(matches!(
        err,
        intake_connect::ConnectError::NotConnected { .. }
    ));

    let events = ctx.store.events().await;
    assert!(events.iter().any(|e| e.event_type == "oauth.denied"));

    authority.verify().await;
}

#[tokio::test]
async fn callback_without_state_fails_closed() {
    let authority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&authority)
        .await;

    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state.clone());

    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("code", "auth-code-7")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "invalid_session");

    assert!(ctx.store.events().await.is_empty());
    authority.verify().await;
}

#[tokio::test]
async fn callback_with_forged_state_fails_closed() {
    let authority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&authority)
        .await;

    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state.clone());

    // Signed under a different HMAC key than the service's.
    let forger = CryptoEngine::new(
        &STANDARD.encode([0x42u8; 32]),
        &STANDARD.encode([0x07u8; 32]),
    )
    .expect("crypto engine");
    let forged = forger
        .sign_state(&format!("cases:office:{}", Utc::now().timestamp()))
        .expect("sign state");

    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("code", "auth-code-7")
        .add_query_param("state", forged)
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "invalid_session");
    authority.verify().await;
}

#[tokio::test]
async fn callback_with_expired_state_fails_closed() {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state.clone());

    // Minted 700s ago, past the 10-minute window.
    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("code", "auth-code-7")
        .add_query_param("state", signed_state("cases", "office", 700))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "invalid_session");
}

#[tokio::test]
async fn callback_rejects_state_minted_for_another_provider() {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state.clone());

    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("code", "auth-code-7")
        .add_query_param(
            "state",
            signed_state("drive", &format!("staff:{STAFF_ID}"), 0),
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "invalid_session");
}

#[tokio::test]
async fn failed_exchange_is_terminal() {
    let authority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Code already used"
        })))
        .expect(1)
        .mount(&authority)
        .await;

    let ctx = build_state(&authority.uri(), &authority.uri());
    let server = test_server(ctx.state.clone());

    let resp = server
        .get("/v1/oauth/callback/cases")
        .add_query_param("code", "auth-code-7")
        .add_query_param("state", signed_state("cases", "office", 0))
        .await;
    resp.assert_status(StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "exchange_failed");

    let err = ctx
        .store
        .get("cases", &Subject::Office)
        .await
        .expect_err("nothing was stored");
    assert!(matches!(
        err,
        intake_connect::ConnectError::NotConnected { .. }
    ));
    authority.verify().await;
}

// ── Connections ──────────────────────────────────────────────────────────

#[tokio::test]
async fn connections_reports_status_per_provider() -> anyhow::Result<()> {
    let authority = MockServer::start().await;
    let ctx = build_state(&authority.uri(), &authority.uri());
    ctx.store
        .upsert(&stored_record("cases", Subject::Office, 3600))
        .await?;
    let server: TestServer = test_server(ctx.state.clone());

    let resp = with_staff(server.get("/v1/connections"), STAFF_ID).await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    let data = body["data"].as_array().expect("data array");
    assert_eq!(data.len(), 2);

    // Sorted by provider id
    assert_eq!(data[0]["provider"], "cases");
    assert_eq!(data[0]["display_name"], "Case Management");
    assert_eq!(data[0]["subject"], "office");
    assert_eq!(data[0]["connected"], true);
    assert_eq!(data[0]["scope"], "read write");

    assert_eq!(data[1]["provider"], "drive");
    assert_eq!(data[1]["display_name"], "Document Drive");
    assert_eq!(data[1]["subject"], format!("staff:{STAFF_ID}"));
    assert_eq!(data[1]["connected"], false);
    Ok(())
}

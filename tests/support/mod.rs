//! Shared fixtures for the integration test suites.
//!
//! Every suite runs against the in-memory token store and a wiremock
//! authority; nothing here touches PostgreSQL or real providers.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Duration, Utc};

use intake_connect::config::{Config, IntegrationConfig};
use intake_connect::crypto::CryptoEngine;
use intake_connect::store::{MemoryTokenStore, Subject, TokenRecord};
use intake_connect::{api, AppState, SharedState};

/// Secret the intake app would send on internal calls.
pub const INTERNAL_SECRET: &str = "test-internal-secret";

/// Staff member used throughout the suites.
pub const STAFF_ID: &str = "u_802";

pub fn master_key() -> String {
    STANDARD.encode([0x42u8; 32])
}

pub fn hmac_secret() -> String {
    STANDARD.encode([0x43u8; 32])
}

/// Engine with the same keys the test state uses, for minting and
/// inspecting state parameters from the outside.
pub fn test_engine() -> CryptoEngine {
    CryptoEngine::new(&master_key(), &hmac_secret()).expect("crypto engine")
}

/// Integration config with every endpoint under one base URL.
pub fn integration(base: &str) -> IntegrationConfig {
    IntegrationConfig {
        client_id: "client-id-123".into(),
        client_secret: "client-secret-xyz".into(),
        auth_url: format!("{base}/authorize"),
        token_url: format!("{base}/token"),
        api_base_url: base.to_string(),
        scopes: vec!["read".into(), "write".into()],
    }
}

pub fn test_config(cases_base: &str, drive_base: &str) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        base_url: "http://connect.test".into(),
        dashboard_url: "http://dashboard.test".into(),
        database_url: "postgres://unused".into(),
        master_key: master_key(),
        hmac_secret: hmac_secret(),
        internal_secret: INTERNAL_SECRET.into(),
        cases: Some(integration(cases_base)),
        drive: Some(integration(drive_base)),
    }
}

/// Wired application state plus a concrete handle on the backing store,
/// so tests can seed records and read the activity log directly.
pub struct TestContext {
    pub state: SharedState,
    pub store: Arc<MemoryTokenStore>,
}

pub fn build_state(cases_base: &str, drive_base: &str) -> TestContext {
    let store = Arc::new(MemoryTokenStore::new());
    let crypto = Arc::new(test_engine());
    let state = Arc::new(AppState::new(
        test_config(cases_base, drive_base),
        store.clone(),
        crypto,
    ));
    TestContext { state, store }
}

pub fn test_server(state: SharedState) -> TestServer {
    TestServer::new(api::router(state)).expect("failed to create test server")
}

/// A stored credential expiring `expires_in_secs` from now. Negative
/// values produce an already-expired record.
pub fn stored_record(provider: &str, subject: Subject, expires_in_secs: i64) -> TokenRecord {
    let now = Utc::now();
    TokenRecord {
        provider: provider.into(),
        subject,
        access_token: "stored-access-token".into(),
        refresh_token: Some("stored-refresh-token".into()),
        token_type: "Bearer".into(),
        scope: "read write".into(),
        expires_at: now + Duration::seconds(expires_in_secs),
        updated_at: now,
    }
}

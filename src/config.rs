use anyhow::{Context, Result};

/// OAuth + API settings for one integration, loaded from `{PREFIX}_*`
/// environment variables. Endpoint URLs are configuration rather than
/// constants so staging and test environments can point elsewhere.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Authorization endpoint the browser is redirected to.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
    /// Base URL for domain API calls (no trailing slash).
    pub api_base_url: String,
    /// Scopes requested at authorization time (space-delimited in env).
    pub scopes: Vec<String>,
}

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,
    /// Intake frontend URL for post-OAuth redirects
    pub dashboard_url: String,

    // ── Database (PostgreSQL, shared with the intake app) ──────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded master key for AES-256-GCM encryption.
    pub master_key: String,
    /// 32-byte base64-encoded HMAC key for state parameter signing.
    pub hmac_secret: String,

    // ── Service-to-service auth ─────────────────────────────────────────
    /// Shared secret the intake app sends on internal calls.
    pub internal_secret: String,

    // ── Integrations ────────────────────────────────────────────────────
    /// Case-management platform (office-wide account).
    pub cases: Option<IntegrationConfig>,
    /// Document-storage service (per-staff accounts).
    pub drive: Option<IntegrationConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8430".into())
                .parse()
                .context("Invalid PORT")?,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8430".into()),
            dashboard_url: std::env::var("DASHBOARD_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            master_key: std::env::var("MASTER_KEY")
                .context("MASTER_KEY is required (32 bytes, base64)")?,
            hmac_secret: std::env::var("HMAC_SECRET")
                .context("HMAC_SECRET is required (32 bytes, base64)")?,

            internal_secret: std::env::var("INTERNAL_SECRET")
                .context("INTERNAL_SECRET is required for service-to-service auth")?,

            cases: integration_from_env("CASES")?,
            drive: integration_from_env("DRIVE")?,
        })
    }

    /// Get the OAuth callback URL for a specific provider.
    pub fn callback_url(&self, provider: &str) -> String {
        format!("{}/v1/oauth/callback/{}", self.base_url, provider)
    }
}

/// An integration is enabled by setting `{PREFIX}_CLIENT_ID`; the rest of
/// its settings are then required.
fn integration_from_env(prefix: &str) -> Result<Option<IntegrationConfig>> {
    let client_id = match std::env::var(format!("{prefix}_CLIENT_ID")) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    let require = |name: &str| {
        std::env::var(format!("{prefix}_{name}")).with_context(|| {
            format!("{prefix}_{name} is required when {prefix}_CLIENT_ID is set")
        })
    };

    Ok(Some(IntegrationConfig {
        client_id,
        client_secret: require("CLIENT_SECRET")?,
        auth_url: require("AUTH_URL")?,
        token_url: require("TOKEN_URL")?,
        api_base_url: require("API_BASE_URL")?,
        scopes: std::env::var(format!("{prefix}_SCOPES"))
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    }))
}

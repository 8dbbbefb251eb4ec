use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{OAuthProvider, TokenSet};
use crate::config::IntegrationConfig;
use crate::error::ConnectError;

/// OAuth 2.0 provider for the case-management platform.
///
/// Quirks:
/// - Plain authorization-code flow, no PKCE.
/// - Refresh responses usually omit `refresh_token`; the stored one keeps
///   working until the grant is revoked in the vendor console.
/// - `expires_in` is sometimes absent on refresh; callers fall back to an
///   hour.
pub struct CasesProvider {
    cfg: IntegrationConfig,
    http: reqwest::Client,
}

// Raw token response from the platform's token endpoint
#[derive(Debug, Deserialize)]
struct CasesTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_in: Option<u64>,
    scope: Option<String>,
}

impl CasesProvider {
    pub fn new(cfg: IntegrationConfig) -> Self {
        Self {
            cfg,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OAuthProvider for CasesProvider {
    fn id(&self) -> &str {
        "cases"
    }

    fn display_name(&self) -> &str {
        "Case Management"
    }

    fn auth_url(&self, state: &str, redirect_uri: &str) -> String {
        let scope_str = self.cfg.scopes.join(" ");
        format!(
            "{base}?client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}",
            base = self.cfg.auth_url,
            client_id = urlencoding(&self.cfg.client_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&scope_str),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, ConnectError> {
        let resp = self
            .http
            .post(&self.cfg.token_url)
            .form(&[
                ("code", code),
                ("client_id", &self.cfg.client_id),
                ("client_secret", &self.cfg.client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| ConnectError::ExchangeFailed(format!("Token request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectError::ExchangeFailed(format!(
                "Case-management exchange rejected: {body}"
            )));
        }

        let token_resp: CasesTokenResponse = resp.json().await.map_err(|e| {
            ConnectError::ExchangeFailed(format!("Failed to parse token response: {e}"))
        })?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            refresh_token: token_resp.refresh_token,
            token_type: token_resp.token_type,
            expires_in: token_resp.expires_in,
            scope: token_resp.scope,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, ConnectError> {
        let resp = self
            .http
            .post(&self.cfg.token_url)
            .form(&[
                ("refresh_token", refresh_token),
                ("client_id", &self.cfg.client_id),
                ("client_secret", &self.cfg.client_secret),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| ConnectError::RefreshFailed(format!("Refresh request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectError::RefreshFailed(format!(
                "Case-management refresh rejected: {body}"
            )));
        }

        let token_resp: CasesTokenResponse = resp.json().await.map_err(|e| {
            ConnectError::RefreshFailed(format!("Failed to parse refresh response: {e}"))
        })?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            // Usually None here; the stored refresh token stays valid
            refresh_token: token_resp.refresh_token,
            token_type: token_resp.token_type,
            expires_in: token_resp.expires_in,
            scope: token_resp.scope,
        })
    }
}

/// Simple percent-encoding for URL parameters.
fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{OAuthProvider, TokenSet};
use crate::config::IntegrationConfig;
use crate::error::ConnectError;

/// OAuth 2.0 provider for the document-storage service.
///
/// Quirks:
/// - Scopes are configured on the app in the vendor console; the
///   authorization URL only carries them when we have some to ask for.
/// - Refresh tokens are single use: every refresh returns a replacement
///   that must be stored, or the grant dies with the old one.
/// - Access tokens live roughly an hour; `expires_in` is always present
///   in practice but treated as optional.
pub struct DriveProvider {
    cfg: IntegrationConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DriveTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_in: Option<u64>,
    scope: Option<String>,
}

impl DriveProvider {
    pub fn new(cfg: IntegrationConfig) -> Self {
        Self {
            cfg,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OAuthProvider for DriveProvider {
    fn id(&self) -> &str {
        "drive"
    }

    fn display_name(&self) -> &str {
        "Document Drive"
    }

    fn auth_url(&self, state: &str, redirect_uri: &str) -> String {
        let mut url = format!(
            "{base}?client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &state={state}",
            base = self.cfg.auth_url,
            client_id = urlencoding(&self.cfg.client_id),
            redirect_uri = urlencoding(redirect_uri),
            state = urlencoding(state),
        );
        if !self.cfg.scopes.is_empty() {
            url.push_str("&scope=");
            url.push_str(&urlencoding(&self.cfg.scopes.join(" ")));
        }
        url
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
                "Drive exchange rejected: {body}"
            )));
        }

        let token_resp: DriveTokenResponse = resp.json().await.map_err(|e| {
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
                "Drive refresh rejected: {body}"
            )));
        }

        let token_resp: DriveTokenResponse = resp.json().await.map_err(|e| {
            ConnectError::RefreshFailed(format!("Failed to parse refresh response: {e}"))
        })?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            // Rotated on every refresh; dropping it would orphan the grant
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

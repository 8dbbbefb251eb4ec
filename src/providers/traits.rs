use async_trait::async_trait;

use crate::error::ConnectError;

/// Tokens returned by an authority after a code exchange or a refresh.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// One OAuth integration: how to send a browser to consent, and how to
/// turn authorization codes and refresh tokens into token sets.
///
/// Implementations talk to the authority and nothing else; persistence
/// and freshness policy belong to the callers.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Unique provider identifier ("cases", "drive").
    fn id(&self) -> &str;

    /// Label shown in the intake app's connections view.
    fn display_name(&self) -> &str;

    /// Build the authorization URL the browser is redirected to.
    ///
    /// - `state`: opaque HMAC-signed payload minted by the handshake; the
    ///   only carrier of subject identity across the redirect.
    /// - `redirect_uri`: the callback URL registered with the authority.
    fn auth_url(&self, state: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str, redirect_uri: &str)
        -> Result<TokenSet, ConnectError>;

    /// Mint a new token set from a refresh token. One request, no retry;
    /// callers decide what a failure means.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, ConnectError>;
}

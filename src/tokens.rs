//! Lazy token freshness.
//!
//! `TokenService::ensure_fresh` is the one refresh implementation in the
//! service; the integration clients and handshake code all go through it.
//! There is no background refresh: a token is refreshed inline, by the
//! call that needs it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ConnectError;
use crate::providers::ProviderRegistry;
use crate::store::{Subject, TokenRecord, TokenStore};

/// Refresh margin in seconds. A token expiring inside this window counts
/// as stale even though it is still technically valid.
pub const REFRESH_SKEW_SECS: i64 = 300;

/// Fallback lifetime when an authority omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    registry: Arc<ProviderRegistry>,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self { store, registry }
    }

    /// Load the record for a subject and make sure it is usable. This is
    /// the lookup every domain operation starts with; a missing record
    /// surfaces as `NotConnected`.
    pub async fn fresh_access_token(
        &self,
        provider: &str,
        subject: &Subject,
    ) -> Result<String, ConnectError> {
        let record = self.store.get(provider, subject).await?;
        let record = self.ensure_fresh(record).await?;
        Ok(record.access_token)
    }

    /// Return a usable record, refreshing and persisting first if the
    /// stored one is stale.
    ///
    /// Stale means `now >= expires_at - REFRESH_SKEW_SECS`. A fresh record
    /// is returned as-is with no network traffic. The refresh itself is a
    /// single attempt; on failure the stored record stays untouched and
    /// the error carries the authority's detail. Two racing callers may
    /// both refresh the same subject; the store resolves that
    /// last-write-wins and both tokens work.
    pub async fn ensure_fresh(&self, record: TokenRecord) -> Result<TokenRecord, ConnectError> {
        let now = Utc::now();
        if record.expires_at - Duration::seconds(REFRESH_SKEW_SECS) > now {
            return Ok(record);
        }

        match self.refresh(&record).await {
            Ok(refreshed) => Ok(refreshed),
            Err(e) => {
                warn!(
                    "Refresh failed for {}/{}: {e}",
                    record.provider, record.subject
                );
                let _ = self
                    .store
                    .log_event(
                        "oauth.refresh_failed",
                        &record.provider,
                        &record.subject,
                        json!({ "detail": e.to_string() }),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, ConnectError> {
        let provider = self
            .registry
            .get(&record.provider)
            .ok_or_else(|| ConnectError::ProviderNotFound(record.provider.clone()))?;

        let refresh_token = record.refresh_token.as_deref().ok_or_else(|| {
            ConnectError::RefreshFailed("No refresh token stored; re-authorization required".into())
        })?;

        // One attempt, no backoff. Callers decide what happens next.
        let set = provider.refresh_token(refresh_token).await?;

        let now = Utc::now();
        let expires_in = set.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let refreshed = TokenRecord {
            provider: record.provider.clone(),
            subject: record.subject.clone(),
            access_token: set.access_token,
            // Keep the stored refresh token unless the authority rotated it
            refresh_token: set.refresh_token.or_else(|| record.refresh_token.clone()),
            token_type: set.token_type,
            scope: set.scope.unwrap_or_else(|| record.scope.clone()),
            expires_at: now + Duration::seconds(expires_in as i64),
            updated_at: now,
        };

        self.store.upsert(&refreshed).await?;
        info!(
            "Refreshed {} token for {}",
            refreshed.provider, refreshed.subject
        );

        Ok(refreshed)
    }
}

//! PostgreSQL-backed token store.
//!
//! Tables:
//! - `oauth_tokens`: encrypted credentials, UNIQUE on (provider, subject)
//! - `activity_events`: activity log queried by the intake app

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::crypto::CryptoEngine;
use crate::error::ConnectError;

use super::{ConnectionStatus, Subject, TokenRecord, TokenStore};

/// Token store backed by PostgreSQL. Token values are encrypted with the
/// crypto engine before they touch a row.
pub struct PgTokenStore {
    pool: PgPool,
    crypto: Arc<CryptoEngine>,
}

impl PgTokenStore {
    pub async fn new(db_url: &str, crypto: Arc<CryptoEngine>) -> Result<Self, ConnectError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await
            .map_err(|e| ConnectError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool, crypto })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), ConnectError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oauth_tokens (
                id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                provider      TEXT NOT NULL,
                subject       TEXT NOT NULL,
                access_token  TEXT NOT NULL,
                refresh_token TEXT,
                token_type    TEXT NOT NULL DEFAULT 'Bearer',
                scope         TEXT NOT NULL DEFAULT '',
                expires_at    TIMESTAMPTZ NOT NULL,
                created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE(provider, subject)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activity_events (
                id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                event_type  TEXT NOT NULL,
                provider    TEXT NOT NULL DEFAULT '',
                subject     TEXT NOT NULL DEFAULT '',
                metadata    JSONB NOT NULL DEFAULT '{}',
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activity_events_created ON activity_events(created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn get(&self, provider: &str, subject: &Subject) -> Result<TokenRecord, ConnectError> {
        let row = sqlx::query(
            r#"
            SELECT access_token, refresh_token, token_type, scope, expires_at, updated_at
            FROM oauth_tokens
            WHERE provider = $1 AND subject = $2
            "#,
        )
        .bind(provider)
        .bind(subject.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| ConnectError::NotConnected {
            provider: provider.to_string(),
            subject: subject.to_string(),
        })?;

        let enc_access: String = row.get(0);
        let enc_refresh: Option<String> = row.try_get(1).ok();
        let token_type: String = row.get(2);
        let scope: String = row.get(3);
        let expires_at: DateTime<Utc> = row.get(4);
        let updated_at: DateTime<Utc> = row.get(5);

        let access_token = self.crypto.decrypt(&enc_access)?;
        let refresh_token = match enc_refresh {
            Some(ref rt) if !rt.is_empty() => Some(self.crypto.decrypt(rt)?),
            _ => None,
        };

        Ok(TokenRecord {
            provider: provider.to_string(),
            subject: subject.clone(),
            access_token,
            refresh_token,
            token_type,
            scope,
            expires_at,
            updated_at,
        })
    }

    async fn upsert(&self, record: &TokenRecord) -> Result<(), ConnectError> {
        let enc_access = self.crypto.encrypt(&record.access_token)?;
        let enc_refresh = match &record.refresh_token {
            Some(rt) => Some(self.crypto.encrypt(rt)?),
            None => None,
        };

        // Full overwrite on conflict. Concurrent refreshes of the same
        // subject race benignly: whichever lands last wins whole.
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens
                (provider, subject, access_token, refresh_token, token_type, scope, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider, subject)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                token_type = EXCLUDED.token_type,
                scope = EXCLUDED.scope,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(&record.provider)
        .bind(record.subject.to_string())
        .bind(&enc_access)
        .bind(&enc_refresh)
        .bind(&record.token_type)
        .bind(&record.scope)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_status(&self) -> Result<Vec<ConnectionStatus>, ConnectError> {
        let rows = sqlx::query(
            r#"
            SELECT provider, subject, scope, expires_at, created_at, updated_at
            FROM oauth_tokens
            ORDER BY provider, subject
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let statuses = rows
            .iter()
            .map(|row| ConnectionStatus {
                provider: row.get(0),
                subject: row.get(1),
                scope: row.get(2),
                expires_at: row.get(3),
                connected_at: row.get(4),
                updated_at: row.get(5),
            })
            .collect();

        Ok(statuses)
    }

    async fn log_event(
        &self,
        event_type: &str,
        provider: &str,
        subject: &Subject,
        metadata: serde_json::Value,
    ) -> Result<(), ConnectError> {
        sqlx::query(
            r#"
            INSERT INTO activity_events (event_type, provider, subject, metadata)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event_type)
        .bind(provider)
        .bind(subject.to_string())
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

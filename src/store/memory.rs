//! In-memory token store for the test suites and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::ConnectError;

use super::{ActivityEvent, ConnectionStatus, Subject, TokenRecord, TokenStore};

struct StoredRecord {
    record: TokenRecord,
    created_at: DateTime<Utc>,
}

/// Map-backed store with the same upsert/get semantics as the PostgreSQL
/// backend (full overwrite on conflict, last write wins).
#[derive(Default)]
pub struct MemoryTokenStore {
    records: RwLock<HashMap<(String, String), StoredRecord>>,
    events: RwLock<Vec<ActivityEvent>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the activity log, oldest first.
    pub async fn events(&self) -> Vec<ActivityEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, provider: &str, subject: &Subject) -> Result<TokenRecord, ConnectError> {
        let key = (provider.to_string(), subject.to_string());
        let records = self.records.read().await;
        records
            .get(&key)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| ConnectError::NotConnected {
                provider: provider.to_string(),
                subject: subject.to_string(),
            })
    }

    async fn upsert(&self, record: &TokenRecord) -> Result<(), ConnectError> {
        let key = (record.provider.clone(), record.subject.to_string());
        let now = Utc::now();
        let mut records = self.records.write().await;

        let created_at = records.get(&key).map(|s| s.created_at).unwrap_or(now);
        let mut record = record.clone();
        record.updated_at = now;

        records.insert(key, StoredRecord { record, created_at });
        Ok(())
    }

    async fn list_status(&self) -> Result<Vec<ConnectionStatus>, ConnectError> {
        let records = self.records.read().await;
        let mut statuses: Vec<ConnectionStatus> = records
            .values()
            .map(|stored| ConnectionStatus {
                provider: stored.record.provider.clone(),
                subject: stored.record.subject.to_string(),
                scope: stored.record.scope.clone(),
                expires_at: stored.record.expires_at,
                connected_at: stored.created_at,
                updated_at: stored.record.updated_at,
            })
            .collect();
        statuses.sort_by(|a, b| (&a.provider, &a.subject).cmp(&(&b.provider, &b.subject)));
        Ok(statuses)
    }

    async fn log_event(
        &self,
        event_type: &str,
        provider: &str,
        subject: &Subject,
        metadata: serde_json::Value,
    ) -> Result<(), ConnectError> {
        self.events.write().await.push(ActivityEvent {
            event_type: event_type.to_string(),
            provider: provider.to_string(),
            subject: subject.to_string(),
            metadata,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

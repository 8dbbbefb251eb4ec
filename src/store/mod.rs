//! Token store — durable keyed storage of integration credentials.
//!
//! One record per (provider, subject), atomic upsert, last-write-wins.
//! The PostgreSQL backend shares the intake app's database; the in-memory
//! backend serves the test suites and local development.

pub mod memory;
pub mod postgres;

pub use memory::MemoryTokenStore;
pub use postgres::PgTokenStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ConnectError;

/// Whose credential a record holds. The case-management platform is
/// connected once for the whole office; document-storage accounts belong
/// to individual staff members.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Office,
    Staff(String),
}

impl Subject {
    /// Parse the stored form (`office` or `staff:<id>`). Anything else is
    /// rejected rather than guessed.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "office" {
            return Some(Subject::Office);
        }
        s.strip_prefix("staff:")
            .filter(|id| !id.is_empty())
            .map(|id| Subject::Staff(id.to_string()))
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Office => f.write_str("office"),
            Subject::Staff(id) => write!(f, "staff:{id}"),
        }
    }
}

impl Serialize for Subject {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A stored credential for one (provider, subject) pair.
///
/// `expires_at` is always issuance time plus the authority's declared
/// lifetime; nothing here is ever derived from the token's own contents.
/// `updated_at` is set by the store on write.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub provider: String,
    pub subject: Subject,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Connection metadata for status listings. Carries no token material.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub provider: String,
    pub subject: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub connected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the activity log the intake app surfaces to staff.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub event_type: String,
    pub provider: String,
    pub subject: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Storage behind the token lifecycle.
///
/// `upsert` inserts or fully overwrites the record for its key; concurrent
/// writers resolve last-write-wins with no field merging. A missing row on
/// `get` is `NotConnected`, kept distinguishable from `Database` so callers
/// can tell "ask the user to authorize" from "storage is unwell".
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, provider: &str, subject: &Subject) -> Result<TokenRecord, ConnectError>;

    async fn upsert(&self, record: &TokenRecord) -> Result<(), ConnectError>;

    /// Metadata for every stored record, for the connections view.
    async fn list_status(&self) -> Result<Vec<ConnectionStatus>, ConnectError>;

    /// Append to the activity log. Callers treat failures as ignorable.
    async fn log_event(
        &self,
        event_type: &str,
        provider: &str,
        subject: &Subject,
        metadata: serde_json::Value,
    ) -> Result<(), ConnectError>;
}

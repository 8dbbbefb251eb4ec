//! Document-storage API client.
//!
//! Folder listing and multipart upload against the drive service. Every
//! call runs under the staff member's own connection; the office has no
//! shared drive credential.

use reqwest::multipart;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::IntegrationConfig;
use crate::error::ConnectError;
use crate::store::Subject;
use crate::tokens::TokenService;

pub struct DriveClient {
    cfg: IntegrationConfig,
    http: reqwest::Client,
    tokens: TokenService,
}

/// A folder the staff member can file evidence under.
#[derive(Debug, Clone, Serialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

/// The stored copy of an uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ItemList {
    entries: Vec<RemoteItem>,
}

#[derive(Debug, Deserialize)]
struct RemoteItem {
    #[serde(rename = "type")]
    item_type: String,
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    entries: Vec<RemoteFile>,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    id: String,
    name: String,
    size: Option<u64>,
}

impl DriveClient {
    pub fn new(cfg: IntegrationConfig, tokens: TokenService) -> Self {
        Self {
            cfg,
            http: reqwest::Client::new(),
            tokens,
        }
    }

    /// List the folders directly under `parent_id` (service root when
    /// absent). Files in the same parent are skipped.
    pub async fn list_folders(
        &self,
        subject: &Subject,
        parent_id: Option<&str>,
    ) -> Result<Vec<Folder>, ConnectError> {
        let token = self.tokens.fresh_access_token("drive", subject).await?;

        let parent = parent_id.unwrap_or("0");
        let url = format!(
            "{}/folders/{}/items?limit=1000",
            self.cfg.api_base_url, parent
        );

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ConnectError::Provider(format!("Drive request failed: {e}")))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ConnectError::Unauthorized);
            }
            s if !s.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(ConnectError::Provider(format!(
                    "Drive API returned {s}: {body}"
                )));
            }
            _ => {}
        }

        let items: ItemList = resp
            .json()
            .await
            .map_err(|e| ConnectError::Provider(format!("Failed to parse drive response: {e}")))?;

        Ok(items
            .entries
            .into_iter()
            .filter(|item| item.item_type == "folder")
            .map(|item| Folder {
                id: item.id,
                name: item.name,
            })
            .collect())
    }

    /// Upload a file into `folder_id` under the staff member's account.
    /// Multipart: a JSON `attributes` part naming the file and parent,
    /// then the file bytes.
    pub async fn upload_file(
        &self,
        subject: &Subject,
        folder_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, ConnectError> {
        let token = self.tokens.fresh_access_token("drive", subject).await?;

        let attributes = serde_json::json!({
            "name": file_name,
            "parent": { "id": folder_id },
        })
        .to_string();

        let form = multipart::Form::new()
            .text("attributes", attributes)
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            );

        let url = format!("{}/files/content", self.cfg.api_base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ConnectError::Provider(format!("Drive upload failed: {e}")))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ConnectError::Unauthorized);
            }
            s if !s.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(ConnectError::Provider(format!(
                    "Drive upload returned {s}: {body}"
                )));
            }
            _ => {}
        }

        let result: UploadResult = resp.json().await.map_err(|e| {
            ConnectError::Provider(format!("Failed to parse upload response: {e}"))
        })?;

        let file = result.entries.into_iter().next().ok_or_else(|| {
            ConnectError::Provider("Drive upload response contained no entries".into())
        })?;

        Ok(UploadedFile {
            id: file.id,
            name: file.name,
            size: file.size,
        })
    }
}

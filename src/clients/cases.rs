//! Case-management API client.
//!
//! The platform's listing endpoints paginate with an opaque continuation
//! token carried in the `Link` response header (`rel="next"`). Pages are
//! followed until the platform stops linking onward; rows are kept in
//! first-seen order and deduplicated by the platform's stable id, since
//! an entity can appear in overlapping pages.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::IntegrationConfig;
use crate::error::ConnectError;
use crate::store::Subject;
use crate::tokens::TokenService;

/// Hard stop for continuation-following, in case a misbehaving server
/// links forever.
const MAX_PAGES: usize = 50;

/// Client for the office-wide case-management connection.
pub struct CasesClient {
    cfg: IntegrationConfig,
    http: reqwest::Client,
    tokens: TokenService,
}

/// A case as the intake app consumes it.
#[derive(Debug, Clone, Serialize)]
pub struct Case {
    pub id: String,
    pub number: Option<String>,
    pub title: String,
    pub status: Option<String>,
    pub client_name: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// A client (contact) record from the platform.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RemoteCase {
    id: u64,
    display_number: Option<String>,
    #[serde(default)]
    description: String,
    status: Option<String>,
    client: Option<RemoteParty>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RemoteParty {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteContact {
    id: u64,
    name: Option<String>,
    primary_email: Option<String>,
    primary_phone: Option<String>,
}

impl CasesClient {
    pub fn new(cfg: IntegrationConfig, tokens: TokenService) -> Self {
        Self {
            cfg,
            http: reqwest::Client::new(),
            tokens,
        }
    }

    /// Search cases by caption, number, or party name.
    pub async fn search_cases(&self, query: &str) -> Result<Vec<Case>, ConnectError> {
        let url = format!(
            "{}/cases?query={}",
            self.cfg.api_base_url,
            urlencoding(query)
        );
        let rows: Vec<RemoteCase> = self.fetch_all_pages(&url).await?;

        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|c| seen.insert(c.id))
            .map(|c| Case {
                id: c.id.to_string(),
                number: c.display_number,
                title: c.description,
                status: c.status,
                client_name: c.client.and_then(|p| p.name),
                opened_at: c.created_at,
            })
            .collect())
    }

    /// Search client records by name or email.
    pub async fn search_clients(&self, query: &str) -> Result<Vec<ClientRecord>, ConnectError> {
        let url = format!(
            "{}/contacts?query={}",
            self.cfg.api_base_url,
            urlencoding(query)
        );
        let rows: Vec<RemoteContact> = self.fetch_all_pages(&url).await?;

        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|c| seen.insert(c.id))
            .map(|c| ClientRecord {
                id: c.id.to_string(),
                name: c.name.unwrap_or_default(),
                email: c.primary_email,
                phone: c.primary_phone,
            })
            .collect())
    }

    /// Fetch one page after another until the platform stops linking
    /// onward. Rows come back in arrival order, duplicates included;
    /// callers dedupe on their id.
    async fn fetch_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        first_url: &str,
    ) -> Result<Vec<T>, ConnectError> {
        let token = self
            .tokens
            .fresh_access_token("cases", &Subject::Office)
            .await?;

        let mut rows = Vec::new();
        let mut url = first_url.to_string();

        for _ in 0..MAX_PAGES {
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| {
                    ConnectError::Provider(format!("Case-management request failed: {e}"))
                })?;

            match resp.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(ConnectError::Unauthorized);
                }
                s if !s.is_success() => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ConnectError::Provider(format!(
                        "Case-management API returned {s}: {body}"
                    )));
                }
                _ => {}
            }

            let next = next_link(resp.headers());
            let page: Page<T> = resp.json().await.map_err(|e| {
                ConnectError::Provider(format!("Failed to parse case-management response: {e}"))
            })?;
            rows.extend(page.data);

            match next {
                Some(n) => url = n,
                None => return Ok(rows),
            }
        }

        Err(ConnectError::Provider(format!(
            "Case-management pagination did not terminate within {MAX_PAGES} pages"
        )))
    }
}

/// Extract the `rel="next"` target from a `Link` response header.
///
/// `Link: <https://api.example/cases?page_token=abc>; rel="next", <...>; rel="prev"`
fn next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers.get(reqwest::header::LINK)?.to_str().ok()?;

    for part in value.split(',') {
        let mut sections = part.split(';');
        let target = sections.next().unwrap_or("").trim();
        if !(target.starts_with('<') && target.ends_with('>')) {
            continue;
        }
        let is_next = sections.any(|param| {
            let param = param.trim();
            param.eq_ignore_ascii_case(r#"rel="next""#) || param.eq_ignore_ascii_case("rel=next")
        });
        if is_next {
            return Some(target[1..target.len() - 1].to_string());
        }
    }

    None
}

/// Simple percent-encoding for URL parameters.
fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

//! LiveChat API client and the page-source seam the fetch loop runs against.
//!
//! The loop only needs "give me one page for this cursor", so that is the
//! whole trait. [`LiveChatClient`] implements it over `reqwest`; tests use an
//! in-memory fake instead of live HTTP.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use chatsync_config::LiveChatConfig;

use crate::tables::TableSpec;

/// Query for one page of one table.
#[derive(Debug, Clone, PartialEq)]
pub enum PageQuery {
    /// Time-windowed reporting request (GET).
    TimeWindow {
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        limit: u32,
        page: u32,
    },
    /// Token-paginated agent action request (POST). `page_id` is absent on
    /// the first page.
    Token { page_id: Option<String> },
}

/// One-page fetcher the sync loop is generic over.
///
/// Any failure (transport, non-2xx status, unparseable body) surfaces as an
/// `Err`; the loop recovers at table granularity.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    /// Issues exactly one request and returns the parsed JSON response body.
    async fn fetch_page(&self, table: &TableSpec, query: &PageQuery) -> Result<serde_json::Value>;
}

/// Authentication scheme resolved from configuration.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// HTTP basic auth: account email + personal API key (v3.3 reporting API).
    Basic { email: String, api_key: String },
    /// OAuth bearer token (v3.5 agent API).
    Bearer { access_token: String },
}

impl AuthScheme {
    /// Resolves the scheme from config. Bearer wins when both are present,
    /// since the agent-API tables cannot use basic auth.
    pub fn from_config(config: &LiveChatConfig) -> Result<Self> {
        if let Some(token) = &config.access_token {
            return Ok(AuthScheme::Bearer {
                access_token: token.clone(),
            });
        }
        match (&config.email, &config.api_key) {
            (Some(email), Some(api_key)) => Ok(AuthScheme::Basic {
                email: email.clone(),
                api_key: api_key.clone(),
            }),
            _ => bail!(
                "LiveChat credentials missing: need access_token, or email + api_key together"
            ),
        }
    }
}

/// `reqwest`-backed LiveChat API client.
pub struct LiveChatClient {
    client: reqwest::Client,
    base_url: String,
    auth: AuthScheme,
}

impl LiveChatClient {
    /// Builds a client from configuration.
    pub fn from_config(config: &LiveChatConfig) -> Result<Self> {
        let auth = AuthScheme::from_config(config)?;
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("chatsync/0.1")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Builds a client with a custom `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, base_url: &str, auth: AuthScheme) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthScheme::Basic { email, api_key } => req.basic_auth(email, Some(api_key)),
            AuthScheme::Bearer { access_token } => req.bearer_auth(access_token),
        }
    }
}

impl PageSource for LiveChatClient {
    async fn fetch_page(&self, table: &TableSpec, query: &PageQuery) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, table.path);

        let req = match query {
            PageQuery::TimeWindow {
                date_from,
                date_to,
                limit,
                page,
            } => self.apply_auth(self.client.get(&url)).query(&[
                (
                    "date_from",
                    date_from.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                (
                    "date_to",
                    date_to.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                ("limit", limit.to_string()),
                ("page", page.to_string()),
            ]),
            PageQuery::Token { page_id } => {
                let body = match page_id {
                    Some(token) => serde_json::json!({ "page_id": token }),
                    None => serde_json::json!({}),
                };
                self.apply_auth(self.client.post(&url))
                    .header("Accept", "application/json")
                    .json(&body)
            }
        };

        let resp = req
            .send()
            .await
            .with_context(|| format!("Request to {} failed", table.path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "LiveChat API error for table {}: {} - {}",
                table.name,
                status,
                body
            );
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response body for table {}", table.name))
    }
}

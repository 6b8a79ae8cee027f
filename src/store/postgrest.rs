//! HTTP client for a PostgREST-style managed table.

use super::{realtime, ChangeFeed, TableClient};
use crate::config::RemoteConfig;
use crate::error::{SurveyError, SurveyResult};
use crate::models::{NewRecord, StoredRecord};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for `{url}/rest/v1/{table}`.
pub struct PostgrestClient {
    base_url: String,
    api_key: String,
    table: String,
    realtime: bool,
    http: reqwest::Client,
}

impl PostgrestClient {
    /// Build a client from the remote store settings.
    pub fn new(config: &RemoteConfig) -> SurveyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SurveyError::Network(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            realtime: config.realtime,
            http,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn headers(&self) -> SurveyResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| SurveyError::Network(format!("invalid api key header: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| SurveyError::Network(format!("invalid auth header: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

/// Turn a non-2xx response into a network failure carrying the body.
async fn check_status(resp: reqwest::Response, action: &str) -> SurveyResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SurveyError::Network(format!(
        "{} failed status={} body={}",
        action, status, body
    )))
}

#[async_trait]
impl TableClient for PostgrestClient {
    #[instrument(name = "postgrest_insert", skip_all)]
    async fn insert(&self, record: &NewRecord) -> SurveyResult<StoredRecord> {
        let resp = self
            .http
            .post(self.table_url())
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await?;

        let rows: Vec<StoredRecord> = check_status(resp, "insert").await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SurveyError::Network("insert returned no row".to_string()))
    }

    #[instrument(name = "postgrest_select_all", skip_all)]
    async fn select_all(&self) -> SurveyResult<Vec<StoredRecord>> {
        let resp = self
            .http
            .get(self.table_url())
            .headers(self.headers()?)
            .query(&[("select", "*"), ("order", "id.asc")])
            .send()
            .await?;

        let rows: Vec<StoredRecord> = check_status(resp, "select").await?.json().await?;
        debug!("Selected {} rows from {}", rows.len(), self.table);
        Ok(rows)
    }

    async fn subscribe(&self) -> SurveyResult<Option<ChangeFeed>> {
        if !self.realtime {
            debug!("Realtime disabled for {}", self.table);
            return Ok(None);
        }
        realtime::connect(&self.base_url, &self.api_key, &self.table)
            .await
            .map(Some)
    }
}

//! Remote record store.
//!
//! Proxies `append`/`list_all` to a managed table and exposes its change
//! notifications. The table itself sits behind [`TableClient`] so the HTTP
//! client can be swapped for an in-memory table in tests.

use super::{ChangeFeed, RecordStore};
use crate::error::{SurveyError, SurveyResult};
use crate::models::{NewRecord, StoredRecord, SurveyResponse};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Operations the managed database exposes for the responses table.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Insert one row and return it as stored.
    async fn insert(&self, record: &NewRecord) -> SurveyResult<StoredRecord>;

    /// Every row, ordered by id ascending.
    async fn select_all(&self) -> SurveyResult<Vec<StoredRecord>>;

    /// Change notifications for the table, if enabled.
    async fn subscribe(&self) -> SurveyResult<Option<ChangeFeed>>;
}

/// Record store backed by a remote table.
pub struct RemoteStore<C: TableClient> {
    client: Arc<C>,
}

impl<C: TableClient> RemoteStore<C> {
    /// Wrap a table client.
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

/// Anything that is not already a network failure becomes one here.
fn as_network(e: SurveyError) -> SurveyError {
    match e {
        SurveyError::Network(_) => e,
        other => SurveyError::Network(other.to_string()),
    }
}

#[async_trait]
impl<C: TableClient + 'static> RecordStore for RemoteStore<C> {
    fn backend_tag(&self) -> &'static str {
        "remote"
    }

    #[instrument(name = "remote_append", skip_all)]
    async fn append_at(
        &self,
        response: SurveyResponse,
        created_at: Option<DateTime<Utc>>,
    ) -> SurveyResult<StoredRecord> {
        match self.client.insert(&NewRecord::new(response, created_at)).await {
            Ok(record) => {
                debug!("Remote insert returned id {}", record.id);
                Ok(record)
            }
            Err(e) => {
                error!("Remote insert failed: {}", e);
                Err(as_network(e))
            }
        }
    }

    #[instrument(name = "remote_list_all", skip_all)]
    async fn list_all(&self) -> SurveyResult<Vec<StoredRecord>> {
        match self.client.select_all().await {
            Ok(mut records) => {
                records.sort_by_key(|r| r.id);
                debug!("Fetched {} remote records", records.len());
                Ok(records)
            }
            Err(e) => {
                error!("Remote fetch failed: {}", e);
                Err(as_network(e))
            }
        }
    }

    async fn subscribe(&self) -> SurveyResult<Option<ChangeFeed>> {
        self.client.subscribe().await.map_err(|e| {
            error!("Change subscription failed: {}", e);
            as_network(e)
        })
    }
}

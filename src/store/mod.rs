//! Record store backends.
//!
//! Both backends honour the same contract: `append` assigns an id and a
//! timestamp and either persists the record or leaves the store exactly as
//! it was; `list_all` returns the full collection in insertion order.
//! Which backend is used is decided once, by [`open_store`].

pub mod local;
pub mod postgrest;
pub mod realtime;
pub mod remote;
pub mod seed;

#[cfg(test)]
pub mod fake;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::SurveyResult;
use crate::models::{ChangeKind, StoredRecord, SurveyResponse};
use chrono::{DateTime, Utc};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use local::LocalStore;
pub use postgrest::PostgrestClient;
pub use remote::{RemoteStore, TableClient};

/// Durable holder of survey responses.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_tag(&self) -> &'static str;

    /// Persist a new response, returning it with id and timestamp.
    async fn append(&self, response: SurveyResponse) -> SurveyResult<StoredRecord> {
        self.append_at(response, None).await
    }

    /// Like `append`, but keeps `created_at` when one is given.
    async fn append_at(
        &self,
        response: SurveyResponse,
        created_at: Option<DateTime<Utc>>,
    ) -> SurveyResult<StoredRecord>;

    /// Snapshot of every record, ordered by insertion.
    async fn list_all(&self) -> SurveyResult<Vec<StoredRecord>>;

    /// Change notifications, for backends that can be mutated externally.
    async fn subscribe(&self) -> SurveyResult<Option<ChangeFeed>> {
        Ok(None)
    }
}

/// A stream of collection change events.
///
/// Owns the worker producing the events (if any). Dropping the feed stops
/// the worker and closes the channel, so no listener outlives it.
pub struct ChangeFeed {
    receiver: mpsc::UnboundedReceiver<ChangeKind>,
    worker: Option<JoinHandle<()>>,
}

impl ChangeFeed {
    /// Wrap a receiver and the task feeding it.
    pub fn new(receiver: mpsc::UnboundedReceiver<ChangeKind>, worker: Option<JoinHandle<()>>) -> Self {
        Self { receiver, worker }
    }

    /// Wait for the next change. `None` once the source has gone away.
    pub async fn recv(&mut self) -> Option<ChangeKind> {
        self.receiver.recv().await
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(worker) = self.worker.take() {
            debug!("Stopping change feed worker");
            worker.abort();
        }
    }
}

/// Build the record store selected by configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    match config.backend {
        StoreBackend::Local => {
            info!("Using local record store at {}", config.local.path.display());
            Ok(Arc::new(LocalStore::new(
                config.local.path.clone(),
                config.local.seed_on_first_access,
            )))
        }
        StoreBackend::Remote => {
            let remote = &config.remote;
            if remote.url.trim().is_empty() {
                bail!("Remote store selected but no store.remote.url is configured");
            }
            if remote.api_key.trim().is_empty() {
                bail!("Remote store selected but no API key is configured");
            }

            info!("Using remote record store at {}", remote.url);
            let client =
                PostgrestClient::new(remote).context("Failed to create remote store client")?;
            Ok(Arc::new(RemoteStore::new(Arc::new(client))))
        }
    }
}

//! Data session: the explicit data-access lifecycle handed to each view.
//!
//! A session owns a snapshot of the record collection, keeps it current
//! through live sync, and exposes it as a [`ViewState`]. Once closed, every
//! accessor fails with [`SurveyError::MissingContext`].

use crate::error::{SurveyError, SurveyResult};
use crate::models::StoredRecord;
use crate::store::RecordStore;
use crate::sync::LiveSync;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What a view should currently render.
#[derive(Debug, Clone)]
pub enum ViewState {
    /// First fetch still in flight.
    Loading,
    /// Fetched, but the collection has no records.
    Empty,
    Ready(Arc<Vec<StoredRecord>>),
    Failed(String),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    /// Record count, zero unless ready.
    pub fn record_count(&self) -> usize {
        match self {
            ViewState::Ready(records) => records.len(),
            _ => 0,
        }
    }
}

struct Active {
    store: Arc<dyn RecordStore>,
    state: Arc<watch::Sender<ViewState>>,
    wake: Arc<Notify>,
    /// Highest refresh generation asked for.
    requested: Arc<AtomicU64>,
    /// Generation of the last fetch the worker published.
    completed: Arc<watch::Sender<u64>>,
    worker: JoinHandle<()>,
    live: Option<LiveSync>,
}

/// Open connection between a consumer and a record store.
pub struct DataSession {
    active: Option<Active>,
}

async fn fetch_state(store: &dyn RecordStore) -> ViewState {
    match store.list_all().await {
        Ok(records) if records.is_empty() => ViewState::Empty,
        Ok(records) => {
            debug!("Fetched {} records", records.len());
            ViewState::Ready(Arc::new(records))
        }
        Err(e) => {
            error!("Failed to fetch records: {}", e);
            ViewState::Failed(e.to_string())
        }
    }
}

impl DataSession {
    /// Start the session: publish `Loading`, fetch in the background and
    /// subscribe to change notifications.
    ///
    /// Only the worker publishes fetched state, one fetch at a time, so a
    /// slow fetch can never overwrite the result of a later one.
    pub async fn open(store: Arc<dyn RecordStore>) -> Self {
        let (tx, _) = watch::channel(ViewState::Loading);
        let state = Arc::new(tx);
        let wake = Arc::new(Notify::new());
        let requested = Arc::new(AtomicU64::new(0));
        let (done_tx, _) = watch::channel(0u64);
        let completed = Arc::new(done_tx);

        let worker = {
            let store = store.clone();
            let state = state.clone();
            let wake = wake.clone();
            let requested = requested.clone();
            let completed = completed.clone();
            tokio::spawn(async move {
                loop {
                    let generation = requested.load(Ordering::SeqCst);
                    let next = fetch_state(store.as_ref()).await;
                    state.send_replace(next);
                    completed.send_replace(generation);
                    // Events arriving mid-fetch leave a permit, so none are lost.
                    wake.notified().await;
                }
            })
        };

        let trigger = wake.clone();
        let live = match LiveSync::start(store.as_ref(), move || trigger.notify_one()).await {
            Ok(live) => {
                if live.is_active() {
                    // Changes made before the subscription existed are only
                    // visible to a fetch started after it.
                    wake.notify_one();
                }
                Some(live)
            }
            Err(e) => {
                warn!("Live sync unavailable, data will not auto-refresh: {}", e);
                None
            }
        };

        info!("Data session opened on {} store", store.backend_tag());
        Self {
            active: Some(Active {
                store,
                state,
                wake,
                requested,
                completed,
                worker,
                live,
            }),
        }
    }

    fn active(&self) -> SurveyResult<&Active> {
        self.active.as_ref().ok_or_else(|| {
            SurveyError::MissingContext("data session accessed after close".to_string())
        })
    }

    /// Current view state.
    pub fn state(&self) -> SurveyResult<ViewState> {
        Ok(self.active()?.state.borrow().clone())
    }

    /// Receiver notified on every state change.
    pub fn changes(&self) -> SurveyResult<watch::Receiver<ViewState>> {
        Ok(self.active()?.state.subscribe())
    }

    /// Whether change notifications are flowing.
    pub fn is_live(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|a| a.live.as_ref())
            .map_or(false, LiveSync::is_active)
    }

    /// Wait for the first state that is not `Loading`.
    pub async fn wait_ready(&self) -> SurveyResult<ViewState> {
        let mut rx = self.changes()?;
        let state = rx
            .wait_for(|s| !s.is_loading())
            .await
            .map_err(|_| SurveyError::MissingContext("data session closed".to_string()))?;
        Ok(state.clone())
    }

    /// Re-fetch now, e.g. after a local submission. Resolves once a fetch
    /// started after this call has been published.
    pub async fn refresh(&self) -> SurveyResult<ViewState> {
        let active = self.active()?;
        let target = active.requested.fetch_add(1, Ordering::SeqCst) + 1;
        active.wake.notify_one();

        let mut done = active.completed.subscribe();
        done.wait_for(|generation| *generation >= target)
            .await
            .map_err(|_| SurveyError::MissingContext("data session closed".to_string()))?;

        let state = active.state.borrow().clone();
        debug!(
            "Refresh {} on {} store done",
            target,
            active.store.backend_tag()
        );
        Ok(state)
    }

    /// The loaded records. Waits for the first fetch.
    pub async fn records(&self) -> SurveyResult<Arc<Vec<StoredRecord>>> {
        match self.wait_ready().await? {
            ViewState::Ready(records) => Ok(records),
            ViewState::Failed(message) => Err(SurveyError::Network(message)),
            ViewState::Empty | ViewState::Loading => Ok(Arc::new(Vec::new())),
        }
    }

    /// Stop the refresh worker and live sync.
    pub fn close(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.worker.abort();
            if let Some(live) = active.live.as_mut() {
                live.stop();
            }
            info!("Data session closed");
        }
    }
}

impl Drop for DataSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SurveyField, SurveyResponse};
    use crate::store::fake::FakeTable;
    use crate::store::{LocalStore, RemoteStore};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_test::assert_err;

    fn response(occupation: &str) -> SurveyResponse {
        let mut r = SurveyResponse::default();
        r.set(SurveyField::Occupation, Some(occupation.to_string()));
        r
    }

    fn remote(table: &Arc<FakeTable>) -> Arc<dyn RecordStore> {
        Arc::new(RemoteStore::new(table.clone()))
    }

    #[tokio::test]
    async fn test_ready_after_first_fetch() {
        let table = Arc::new(FakeTable::default());
        table.insert_external(response("Student"));
        table.insert_external(response("Retired"));

        let session = DataSession::open(remote(&table)).await;
        let state = session.wait_ready().await.unwrap();
        assert!(matches!(state, ViewState::Ready(_)));
        assert_eq!(state.record_count(), 2);
        assert!(session.is_live());
    }

    #[tokio::test]
    async fn test_empty_is_not_loading() {
        let table = Arc::new(FakeTable::default());
        let session = DataSession::open(remote(&table)).await;

        assert!(matches!(session.wait_ready().await.unwrap(), ViewState::Empty));
        assert!(session.records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let table = Arc::new(FakeTable::default());
        table.set_fail_selects(true);

        let session = DataSession::open(remote(&table)).await;
        assert!(matches!(
            session.wait_ready().await.unwrap(),
            ViewState::Failed(_)
        ));
        assert!(matches!(
            session.records().await,
            Err(SurveyError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_external_change_triggers_refetch() {
        let table = Arc::new(FakeTable::default());
        table.insert_external(response("Student"));

        let session = DataSession::open(remote(&table)).await;
        assert_eq!(session.wait_ready().await.unwrap().record_count(), 1);

        let mut changes = session.changes().unwrap();
        table.insert_external(response("Freelancer"));

        let state = tokio::time::timeout(
            Duration::from_secs(2),
            changes.wait_for(|s| s.record_count() == 2),
        )
        .await
        .expect("no refresh after change")
        .unwrap()
        .clone();
        assert_eq!(state.record_count(), 2);
    }

    #[tokio::test]
    async fn test_manual_refresh_local_store() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn RecordStore> =
            Arc::new(LocalStore::new(dir.path().join("responses.json"), false));

        let session = DataSession::open(store.clone()).await;
        assert!(matches!(session.wait_ready().await.unwrap(), ViewState::Empty));
        assert!(!session.is_live());

        store.append(response("Student")).await.unwrap();
        let state = session.refresh().await.unwrap();
        assert_eq!(state.record_count(), 1);
        assert_eq!(session.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_change_during_slow_subscribe_is_seen() {
        let table = Arc::new(FakeTable::default());
        table.set_subscribe_delay(Duration::from_millis(50));

        let (session, _) = tokio::join!(DataSession::open(remote(&table)), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            table.insert_external(response("Student"));
        });
        assert!(session.is_live());

        let mut changes = session.changes().unwrap();
        let state = tokio::time::timeout(
            Duration::from_secs(1),
            changes.wait_for(|s| s.record_count() == 1),
        )
        .await
        .expect("insert made while subscribing was never fetched")
        .unwrap()
        .clone();
        assert_eq!(state.record_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_not_overwritten_by_stale_fetch() {
        let table = Arc::new(FakeTable::default());
        table.disable_realtime();
        table.hold_next_select();
        let store = remote(&table);

        let session = DataSession::open(store.clone()).await;
        // Let the first fetch take its (empty) snapshot and stall.
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.append(response("Student")).await.unwrap();

        let releaser = {
            let table = table.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                table.release_select();
            })
        };

        let refreshed = tokio::time::timeout(Duration::from_secs(2), session.refresh())
            .await
            .expect("refresh never completed")
            .unwrap();
        releaser.await.unwrap();

        assert_eq!(refreshed.record_count(), 1);
        assert_eq!(session.state().unwrap().record_count(), 1);
    }

    #[tokio::test]
    async fn test_access_after_close_fails_fast() {
        let table = Arc::new(FakeTable::default());
        let mut session = DataSession::open(remote(&table)).await;
        session.wait_ready().await.unwrap();

        session.close();
        assert!(matches!(session.state(), Err(SurveyError::MissingContext(_))));
        assert_err!(session.refresh().await);
        assert_err!(session.records().await);

        for _ in 0..100 {
            if table.active_listeners() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(table.active_listeners(), 0);
    }
}

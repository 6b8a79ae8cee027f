//! Live sync: turns store change events into payload-less callbacks.

use crate::error::SurveyResult;
use crate::store::RecordStore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Listener bound to a store's change feed.
///
/// Inactive when the store has no external mutation source (the local
/// backend). Dropping the adapter stops the listener.
pub struct LiveSync {
    listener: Option<JoinHandle<()>>,
}

impl LiveSync {
    /// Subscribe to `store` and call `on_change` for every event.
    pub async fn start<F>(store: &dyn RecordStore, on_change: F) -> SurveyResult<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let Some(mut feed) = store.subscribe().await? else {
            debug!("{} store has no change feed, live sync inactive", store.backend_tag());
            return Ok(Self { listener: None });
        };

        info!("Live sync started on {} store", store.backend_tag());
        let listener = tokio::spawn(async move {
            while let Some(kind) = feed.recv().await {
                debug!("Store change: {:?}", kind);
                on_change();
            }
            debug!("Change feed ended");
        });

        Ok(Self {
            listener: Some(listener),
        })
    }

    pub fn is_active(&self) -> bool {
        self.listener
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Unsubscribe. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            // Aborting drops the feed, which releases the subscription.
            listener.abort();
            info!("Live sync stopped");
        }
    }
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        self.stop();
    }
}

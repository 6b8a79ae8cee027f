//! In-memory stand-in for the managed responses table.

use super::{ChangeFeed, TableClient};
use crate::error::{SurveyError, SurveyResult};
use crate::models::{ChangeKind, NewRecord, StoredRecord, SurveyResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

#[derive(Default)]
pub struct FakeTable {
    rows: Mutex<Vec<StoredRecord>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<ChangeKind>>>,
    fail_insert: AtomicBool,
    fail_select: AtomicBool,
    realtime_disabled: AtomicBool,
    subscribe_delay: Mutex<Duration>,
    hold_select: AtomicBool,
    release: Notify,
}

impl FakeTable {
    /// The next insert fails with a network error.
    pub fn fail_next_insert(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    pub fn set_fail_selects(&self, fail: bool) {
        self.fail_select.store(fail, Ordering::SeqCst);
    }

    pub fn disable_realtime(&self) {
        self.realtime_disabled.store(true, Ordering::SeqCst);
    }

    /// Subscriptions take this long to become active.
    pub fn set_subscribe_delay(&self, delay: Duration) {
        *self.subscribe_delay.lock().unwrap() = delay;
    }

    /// The next select snapshots the rows, then waits for `release_select`.
    pub fn hold_next_select(&self) {
        self.hold_select.store(true, Ordering::SeqCst);
    }

    pub fn release_select(&self) {
        self.release.notify_one();
    }

    /// Another client inserted a row.
    pub fn insert_external(&self, response: SurveyResponse) -> StoredRecord {
        let id = self.next_id();
        self.insert_external_with_id(id, response)
    }

    pub fn insert_external_with_id(&self, id: u64, response: SurveyResponse) -> StoredRecord {
        self.push_row(id, Utc::now(), response)
    }

    /// Rows exactly as stored.
    pub fn rows(&self) -> Vec<StoredRecord> {
        self.rows.lock().unwrap().clone()
    }

    fn push_row(&self, id: u64, created_at: DateTime<Utc>, response: SurveyResponse) -> StoredRecord {
        let record = StoredRecord {
            id,
            created_at,
            response,
        };
        self.rows.lock().unwrap().push(record.clone());
        self.emit(ChangeKind::Insert);
        record
    }

    /// Notify every live subscriber; closed ones are dropped.
    pub fn emit(&self, kind: ChangeKind) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|tx| tx.send(kind).is_ok());
    }

    /// Subscribers whose receiving side is still alive.
    pub fn active_listeners(&self) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn next_id(&self) -> u64 {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[async_trait]
impl TableClient for FakeTable {
    async fn insert(&self, record: &NewRecord) -> SurveyResult<StoredRecord> {
        if self.fail_insert.swap(false, Ordering::SeqCst) {
            return Err(SurveyError::Network("simulated connection reset".to_string()));
        }
        let id = self.next_id();
        Ok(self.push_row(
            id,
            record.created_at.unwrap_or_else(Utc::now),
            record.response.clone(),
        ))
    }

    async fn select_all(&self) -> SurveyResult<Vec<StoredRecord>> {
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(SurveyError::Network("simulated timeout".to_string()));
        }
        let snapshot = self.rows();
        if self.hold_select.swap(false, Ordering::SeqCst) {
            self.release.notified().await;
        }
        Ok(snapshot)
    }

    async fn subscribe(&self) -> SurveyResult<Option<ChangeFeed>> {
        if self.realtime_disabled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let delay = *self.subscribe_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().push(tx);
        Ok(Some(ChangeFeed::new(rx, None)))
    }
}

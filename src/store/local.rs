//! File-backed record store.
//!
//! Keeps the collection in a JSON array on disk with an in-process cache in
//! front of it. An absent file is seeded from the bundled dataset on first
//! access. Writes go to a temp file in the same directory which is then
//! renamed over the data file, so a failed write never leaves a partial
//! collection behind.

use super::{seed, RecordStore};
use crate::error::{SurveyError, SurveyResult};
use crate::models::{StoredRecord, SurveyResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Durable local cache of survey responses.
pub struct LocalStore {
    path: PathBuf,
    seed_on_first_access: bool,
    cache: Mutex<Option<Vec<StoredRecord>>>,
}

impl LocalStore {
    /// Create a store over `path`. Nothing is read until first access.
    pub fn new(path: PathBuf, seed_on_first_access: bool) -> Self {
        Self {
            path,
            seed_on_first_access,
            cache: Mutex::new(None),
        }
    }

    /// Load the collection from disk, seeding it if no data file exists.
    fn load(&self) -> SurveyResult<Vec<StoredRecord>> {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path).map_err(|e| {
                error!("Could not read {}: {}", self.path.display(), e);
                SurveyError::Storage(format!("read {}: {}", self.path.display(), e))
            })?;

            let records: Vec<StoredRecord> = serde_json::from_str(&content).map_err(|e| {
                error!("Could not parse {}: {}", self.path.display(), e);
                SurveyError::Storage(format!("parse {}: {}", self.path.display(), e))
            })?;

            debug!("Loaded {} records from {}", records.len(), self.path.display());
            return Ok(records);
        }

        if !self.seed_on_first_access {
            debug!("No data file at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let records = seed::into_records(seed::bundled_rows()?, Utc::now());
        write_atomic(&self.path, &records).map_err(|e| {
            error!("Could not initialize {}: {}", self.path.display(), e);
            e
        })?;

        info!(
            "Seeded {} with {} bundled records",
            self.path.display(),
            records.len()
        );
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    fn backend_tag(&self) -> &'static str {
        "local"
    }

    async fn append_at(
        &self,
        response: SurveyResponse,
        created_at: Option<DateTime<Utc>>,
    ) -> SurveyResult<StoredRecord> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load()?);
        }
        let current = cache.as_deref().unwrap_or_default();

        let record = StoredRecord {
            id: current.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            created_at: created_at.unwrap_or_else(Utc::now),
            response,
        };

        let mut updated = current.to_vec();
        updated.push(record.clone());

        if let Err(e) = write_atomic(&self.path, &updated) {
            error!("Could not save response to {}: {}", self.path.display(), e);
            return Err(e);
        }

        *cache = Some(updated);
        Ok(record)
    }

    async fn list_all(&self) -> SurveyResult<Vec<StoredRecord>> {
        let mut cache = self.cache.lock().await;
        if let Some(records) = cache.as_ref() {
            return Ok(records.clone());
        }

        let records = self.load()?;
        *cache = Some(records.clone());
        Ok(records)
    }
}

/// Replace `path` with `records` in one rename.
fn write_atomic(path: &Path, records: &[StoredRecord]) -> SurveyResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = NamedTempFile::new_in(&dir)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SurveyError::Storage(e.error.to_string()))?;

    Ok(())
}

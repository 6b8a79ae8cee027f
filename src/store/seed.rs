//! Bundled seed dataset.
//!
//! A spreadsheet export of the first survey round, keyed by full question
//! text. It only ever initializes an empty store.

use crate::error::{SurveyError, SurveyResult};
use crate::models::StoredRecord;
use crate::submission::mapping::{normalize_seed_row, SeedRow};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

const BUNDLED_SEED: &str = include_str!("../../data/seed.json");

/// The bundled rows, normalized to canonical shape.
pub fn bundled_rows() -> SurveyResult<Vec<SeedRow>> {
    parse_rows(BUNDLED_SEED)
}

/// Parse a long-form seed export.
pub fn parse_rows(json: &str) -> SurveyResult<Vec<SeedRow>> {
    let rows: Vec<Map<String, Value>> = serde_json::from_str(json)
        .map_err(|e| SurveyError::Storage(format!("invalid seed dataset: {}", e)))?;

    Ok(rows.iter().map(normalize_seed_row).collect())
}

/// Turn seed rows into stored records with ids `1..=n`.
///
/// Rows without a usable timestamp get `now`.
pub fn into_records(rows: Vec<SeedRow>, now: DateTime<Utc>) -> Vec<StoredRecord> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| StoredRecord {
            id: i as u64 + 1,
            created_at: row.created_at.unwrap_or(now),
            response: row.response,
        })
        .collect()
}

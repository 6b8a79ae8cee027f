//! Submission pipeline.
//!
//! Translates raw form input into a canonical [`SurveyResponse`], rejects
//! submissions that carry no answers, and hands the result to the injected
//! record store. Failures are returned to the caller; nothing is retried.

pub mod mapping;

use crate::error::{SurveyError, SurveyResult};
use crate::models::{StoredRecord, SurveyResponse};
use crate::store::{seed, RecordStore};
use mapping::{apply, resolve_form_key, NOT_SPECIFIED};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Raw form input: input name → submitted text.
pub type RawFields = BTreeMap<String, String>;

/// Longest accepted value for any single field.
pub const MAX_VALUE_LEN: usize = 2000;

/// Map raw form fields to the canonical response shape.
pub fn normalize_submission(raw: &RawFields) -> SurveyResult<SurveyResponse> {
    let mut response = SurveyResponse::default();

    for (key, value) in raw {
        if value.chars().count() > MAX_VALUE_LEN {
            return Err(SurveyError::InvalidSubmission(format!(
                "value for '{}' exceeds {} characters",
                key, MAX_VALUE_LEN
            )));
        }

        match resolve_form_key(key) {
            Some(target) => apply(&mut response, target, value),
            None => warn!("Dropping unknown form field: {}", key),
        }
    }

    if response.answered_count() == 0 && response.connection_factors.is_none() {
        return Err(SurveyError::InvalidSubmission(
            "no survey questions were answered".to_string(),
        ));
    }

    if response.connection_factors.is_none() {
        response.connection_factors = Some(NOT_SPECIFIED.to_string());
    }

    Ok(response)
}

/// Validates, normalizes and persists new responses.
pub struct Submitter {
    store: Arc<dyn RecordStore>,
}

impl Submitter {
    /// Create a pipeline writing into `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Submit one raw form payload.
    pub async fn submit(&self, raw: &RawFields) -> SurveyResult<StoredRecord> {
        let response = normalize_submission(raw)?;
        debug!("Normalized submission: {:?}", response);

        match self.store.append(response).await {
            Ok(record) => {
                info!(
                    "Stored response #{} via {} store",
                    record.id,
                    self.store.backend_tag()
                );
                Ok(record)
            }
            Err(e) => {
                error!("Submission failed: {}", e);
                Err(e)
            }
        }
    }

    /// Push the bundled seed dataset into the store, one row at a time,
    /// keeping each row's original timestamp.
    ///
    /// Stops at the first failure and reports how many rows made it.
    pub async fn seed(&self) -> SurveyResult<usize> {
        let rows = seed::bundled_rows()?;
        let total = rows.len();

        for (i, row) in rows.into_iter().enumerate() {
            if let Err(e) = self.store.append_at(row.response, row.created_at).await {
                error!("Seeding stopped at row {} of {}: {}", i + 1, total, e);
                return Err(e);
            }
        }

        info!("Seeded {} rows into {} store", total, self.store.backend_tag());
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{frequency, summary_percentages, Ordering};
    use crate::models::SurveyField;
    use crate::store::fake::FakeTable;
    use crate::store::remote::RemoteStore;
    use tokio_test::{assert_err, assert_ok};

    fn raw(pairs: &[(&str, &str)]) -> RawFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fake_store() -> (Arc<FakeTable>, Arc<dyn RecordStore>) {
        let table = Arc::new(FakeTable::default());
        let store: Arc<dyn RecordStore> = Arc::new(RemoteStore::new(table.clone()));
        (table, store)
    }

    #[test]
    fn test_normalize_translates_form_names() {
        let response = normalize_submission(&raw(&[
            ("email", "a@b.c"),
            ("pay_fee", "Yes"),
            ("read_terms", "Never"),
            ("awareness_risk", "High Awareness"),
        ]))
        .unwrap();

        assert_eq!(response.email_address.as_deref(), Some("a@b.c"));
        assert_eq!(response.get(SurveyField::PayForWifi), Some("Yes"));
        assert_eq!(response.get(SurveyField::ReadsTerms), Some("Never"));
        assert_eq!(response.get(SurveyField::AwarenessRisk), Some("High"));
        assert_eq!(response.connection_factors.as_deref(), Some(NOT_SPECIFIED));
    }

    #[test]
    fn test_unexpected_values_pass_through() {
        let response =
            normalize_submission(&raw(&[("wifi_frequency", "Twice a fortnight")])).unwrap();
        assert_eq!(
            response.get(SurveyField::WifiFrequency),
            Some("Twice a fortnight")
        );
    }

    #[test]
    fn test_empty_submission_rejected() {
        let result = normalize_submission(&raw(&[("name", "Anon"), ("csrf", "x")]));
        assert!(matches!(result, Err(SurveyError::InvalidSubmission(_))));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let long = "x".repeat(MAX_VALUE_LEN + 1);
        let result = normalize_submission(&raw(&[("occupation", &long)]));
        assert!(matches!(result, Err(SurveyError::InvalidSubmission(_))));
    }

    #[tokio::test]
    async fn test_missing_pay_fee_is_not_counted_as_no() {
        let (_table, store) = fake_store();
        let submitter = Submitter::new(store.clone());

        let record = assert_ok!(
            submitter
                .submit(&raw(&[("wifi_frequency", "Daily"), ("security_issues", "No")]))
                .await
        );
        assert_eq!(record.get(SurveyField::PayForWifi), None);

        assert_ok!(submitter.submit(&raw(&[("pay_fee", "Yes")])).await);

        let records = store.list_all().await.unwrap();
        let pay = frequency(&records, SurveyField::PayForWifi, Ordering::CountDesc);
        assert_eq!(pay.len(), 1);
        assert_eq!(pay[0].label, "Yes");
        assert_eq!(pay[0].count, 1);

        let summary = summary_percentages(&records);
        assert_eq!(summary.willing_to_pay_percentage, 50);
    }

    #[tokio::test]
    async fn test_store_failure_reported_and_store_unchanged() {
        let (table, store) = fake_store();
        let submitter = Submitter::new(store.clone());
        assert_ok!(submitter.submit(&raw(&[("occupation", "Student")])).await);

        table.fail_next_insert();
        let result = submitter.submit(&raw(&[("occupation", "Retired")])).await;
        assert!(matches!(result, Err(SurveyError::Network(_))));

        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seed_pushes_every_row() {
        let (_table, store) = fake_store();
        let submitter = Submitter::new(store.clone());

        let seeded = assert_ok!(submitter.seed().await);
        assert_eq!(seeded, seed::bundled_rows().unwrap().len());
        assert_eq!(store.list_all().await.unwrap().len(), seeded);
    }

    #[tokio::test]
    async fn test_seed_keeps_original_timestamps() {
        let (table, store) = fake_store();
        let submitter = Submitter::new(store);
        assert_ok!(submitter.seed().await);

        let rows = seed::bundled_rows().unwrap();
        let stored = table.rows();
        assert_eq!(stored.len(), rows.len());
        assert!(rows.iter().any(|r| r.created_at.is_some()));
        for (row, record) in rows.iter().zip(&stored) {
            if let Some(created_at) = row.created_at {
                assert_eq!(record.created_at, created_at);
            }
        }
    }

    #[tokio::test]
    async fn test_seed_stops_on_failure() {
        let (table, store) = fake_store();
        table.fail_next_insert();

        let submitter = Submitter::new(store.clone());
        assert_err!(submitter.seed().await);
        assert!(store.list_all().await.unwrap().is_empty());
    }
}

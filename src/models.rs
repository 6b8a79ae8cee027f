//! Data models for survey responses.
//!
//! A [`SurveyResponse`] is the canonical, normalized shape of one
//! submission. The store wraps it in a [`StoredRecord`] once it has an id
//! and a creation timestamp.

use crate::error::SurveyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A categorical survey question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyField {
    AgeGroup,
    Occupation,
    WifiFrequency,
    ConnectionLocation,
    WifiImportance,
    Activities,
    AwarenessRisk,
    SecurityMeasures,
    SecurityIssues,
    SecurityFeeling,
    Alternatives,
    PayForWifi,
    ReadsTerms,
    Responsibility,
}

impl SurveyField {
    /// Every categorical field, in form order.
    pub const ALL: [SurveyField; 14] = [
        SurveyField::AgeGroup,
        SurveyField::Occupation,
        SurveyField::WifiFrequency,
        SurveyField::ConnectionLocation,
        SurveyField::WifiImportance,
        SurveyField::Activities,
        SurveyField::AwarenessRisk,
        SurveyField::SecurityMeasures,
        SurveyField::SecurityIssues,
        SurveyField::SecurityFeeling,
        SurveyField::Alternatives,
        SurveyField::PayForWifi,
        SurveyField::ReadsTerms,
        SurveyField::Responsibility,
    ];

    /// Canonical storage key.
    pub fn key(&self) -> &'static str {
        match self {
            SurveyField::AgeGroup => "age_group",
            SurveyField::Occupation => "occupation",
            SurveyField::WifiFrequency => "wifi_frequency",
            SurveyField::ConnectionLocation => "connection_location",
            SurveyField::WifiImportance => "wifi_importance",
            SurveyField::Activities => "activities",
            SurveyField::AwarenessRisk => "awareness_risk",
            SurveyField::SecurityMeasures => "security_measures",
            SurveyField::SecurityIssues => "security_issues",
            SurveyField::SecurityFeeling => "security_feeling",
            SurveyField::Alternatives => "alternatives",
            SurveyField::PayForWifi => "pay_for_wifi",
            SurveyField::ReadsTerms => "reads_terms",
            SurveyField::Responsibility => "responsibility",
        }
    }

    /// Human-readable dimension label.
    pub fn label(&self) -> &'static str {
        match self {
            SurveyField::AgeGroup => "Age Group",
            SurveyField::Occupation => "Occupation",
            SurveyField::WifiFrequency => "WiFi Usage Frequency",
            SurveyField::ConnectionLocation => "Connection Location",
            SurveyField::WifiImportance => "Importance of Public WiFi",
            SurveyField::Activities => "Activities Performed",
            SurveyField::AwarenessRisk => "Risk Awareness",
            SurveyField::SecurityMeasures => "Security Measures (VPN)",
            SurveyField::SecurityIssues => "Threats Encountered",
            SurveyField::SecurityFeeling => "Feeling of Security",
            SurveyField::Alternatives => "Preferred Alternatives",
            SurveyField::PayForWifi => "Willingness to Pay",
            SurveyField::ReadsTerms => "Reads Terms & Conditions",
            SurveyField::Responsibility => "Responsibility",
        }
    }
}

impl fmt::Display for SurveyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for SurveyField {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SurveyField::ALL
            .into_iter()
            .find(|field| field.key() == wanted)
            .ok_or_else(|| SurveyError::UnknownField(s.to_string()))
    }
}

/// One survey submission in canonical shape.
///
/// Every answer is optional: the form requires most of them, but neither
/// the store nor the aggregator relies on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_importance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awareness_risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_measures: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_issues: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_feeling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_for_wifi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reads_terms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsibility: Option<String>,
    /// Free-text answer: what makes the respondent pick a network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_factors: Option<String>,
    /// Quiz score carried over from the seed dataset.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub score: Option<String>,
}

impl SurveyResponse {
    /// Value of a categorical field, if answered.
    pub fn get(&self, field: SurveyField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set (or clear) a categorical field.
    pub fn set(&mut self, field: SurveyField, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    /// Number of categorical fields that carry an answer.
    pub fn answered_count(&self) -> usize {
        SurveyField::ALL
            .iter()
            .filter(|field| self.get(**field).is_some())
            .count()
    }

    fn slot(&self, field: SurveyField) -> &Option<String> {
        match field {
            SurveyField::AgeGroup => &self.age_group,
            SurveyField::Occupation => &self.occupation,
            SurveyField::WifiFrequency => &self.wifi_frequency,
            SurveyField::ConnectionLocation => &self.connection_location,
            SurveyField::WifiImportance => &self.wifi_importance,
            SurveyField::Activities => &self.activities,
            SurveyField::AwarenessRisk => &self.awareness_risk,
            SurveyField::SecurityMeasures => &self.security_measures,
            SurveyField::SecurityIssues => &self.security_issues,
            SurveyField::SecurityFeeling => &self.security_feeling,
            SurveyField::Alternatives => &self.alternatives,
            SurveyField::PayForWifi => &self.pay_for_wifi,
            SurveyField::ReadsTerms => &self.reads_terms,
            SurveyField::Responsibility => &self.responsibility,
        }
    }

    fn slot_mut(&mut self, field: SurveyField) -> &mut Option<String> {
        match field {
            SurveyField::AgeGroup => &mut self.age_group,
            SurveyField::Occupation => &mut self.occupation,
            SurveyField::WifiFrequency => &mut self.wifi_frequency,
            SurveyField::ConnectionLocation => &mut self.connection_location,
            SurveyField::WifiImportance => &mut self.wifi_importance,
            SurveyField::Activities => &mut self.activities,
            SurveyField::AwarenessRisk => &mut self.awareness_risk,
            SurveyField::SecurityMeasures => &mut self.security_measures,
            SurveyField::SecurityIssues => &mut self.security_issues,
            SurveyField::SecurityFeeling => &mut self.security_feeling,
            SurveyField::Alternatives => &mut self.alternatives,
            SurveyField::PayForWifi => &mut self.pay_for_wifi,
            SurveyField::ReadsTerms => &mut self.reads_terms,
            SurveyField::Responsibility => &mut self.responsibility,
        }
    }
}

/// Accept either a JSON string or a JSON number (remote rows store the
/// score as numeric).
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// A response once it has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Store-assigned sequential id.
    pub id: u64,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub response: SurveyResponse,
}

impl StoredRecord {
    /// Shortcut for `self.response.get(field)`.
    pub fn get(&self, field: SurveyField) -> Option<&str> {
        self.response.get(field)
    }
}

/// Insert payload. `created_at` is only set when an existing timestamp
/// must be kept (seed import); otherwise the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub response: SurveyResponse,
}

impl NewRecord {
    pub fn new(response: SurveyResponse, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            created_at,
            response,
        }
    }
}

/// Kind of change reported by the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl FromStr for ChangeKind {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INSERT" => Ok(ChangeKind::Insert),
            "UPDATE" => Ok(ChangeKind::Update),
            "DELETE" => Ok(ChangeKind::Delete),
            other => Err(SurveyError::Network(format!(
                "unknown change event: {}",
                other
            ))),
        }
    }
}

//! Field-name and value normalization tables.
//!
//! The survey form, the stored schema and the bundled seed dataset each
//! name things differently. Every translation between them lives here:
//!
//! - [`FORM_FIELDS`]: raw form input name → canonical field.
//! - [`SEED_QUESTIONS`]: long-form seed question text → canonical field.
//! - [`VALUE_RULES`]: verbose option label → short canonical code.

use crate::models::{SurveyField, SurveyResponse};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Placeholder stored when the free-text connection factors are left blank.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Where a raw key lands in the canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Name,
    Email,
    ConnectionFactors,
    Score,
    Timestamp,
    Answer(SurveyField),
}

/// Raw form input names. Canonical keys are accepted too, see
/// [`resolve_form_key`].
pub const FORM_FIELDS: &[(&str, Target)] = &[
    ("name", Target::Name),
    ("email", Target::Email),
    ("age_group", Target::Answer(SurveyField::AgeGroup)),
    ("occupation", Target::Answer(SurveyField::Occupation)),
    ("wifi_frequency", Target::Answer(SurveyField::WifiFrequency)),
    ("connection_location", Target::Answer(SurveyField::ConnectionLocation)),
    ("activities", Target::Answer(SurveyField::Activities)),
    ("awareness_risk", Target::Answer(SurveyField::AwarenessRisk)),
    ("security_measures", Target::Answer(SurveyField::SecurityMeasures)),
    ("security_issues", Target::Answer(SurveyField::SecurityIssues)),
    ("security_feeling", Target::Answer(SurveyField::SecurityFeeling)),
    ("pay_fee", Target::Answer(SurveyField::PayForWifi)),
    ("read_terms", Target::Answer(SurveyField::ReadsTerms)),
    ("responsibility", Target::Answer(SurveyField::Responsibility)),
    ("connection_factors", Target::ConnectionFactors),
];

/// Question text used as keys by the bundled seed dataset.
pub const SEED_QUESTIONS: &[(&str, Target)] = &[
    ("Timestamp", Target::Timestamp),
    ("Email Address", Target::Email),
    ("Name", Target::Name),
    ("What is your age group?", Target::Answer(SurveyField::AgeGroup)),
    ("What is your occupation?", Target::Answer(SurveyField::Occupation)),
    (
        "How often do you use public wifi?",
        Target::Answer(SurveyField::WifiFrequency),
    ),
    (
        "Where do you most often connect to public wifi?",
        Target::Answer(SurveyField::ConnectionLocation),
    ),
    (
        "How important is public wifi to you in your daily routine?",
        Target::Answer(SurveyField::WifiImportance),
    ),
    (
        "What activities do you usually perform on public wifi?",
        Target::Answer(SurveyField::Activities),
    ),
    (
        "Are you aware that using public wifi can pose security risk (eg. data theft, hacking, etc)?",
        Target::Answer(SurveyField::AwarenessRisk),
    ),
    (
        "Do you use any security measures while using public wifi?",
        Target::Answer(SurveyField::SecurityMeasures),
    ),
    (
        "Have you ever faced any security issues while using public wifi (eg. hacking, data lost, suspicious activity)?",
        Target::Answer(SurveyField::SecurityIssues),
    ),
    (
        "How secure do you feel while using public wifi?",
        Target::Answer(SurveyField::SecurityFeeling),
    ),
    (
        "If public wifi was not available what alternatives would you prefer?",
        Target::Answer(SurveyField::Alternatives),
    ),
    (
        "Would you be willing to pay a small fee for safer and more secure public Wi-Fi?",
        Target::Answer(SurveyField::PayForWifi),
    ),
    (
        "What factors influence your decision to connect to a public Wi-Fi network?",
        Target::ConnectionFactors,
    ),
    (
        "Do you read the terms and conditions before connecting to public Wi-Fi?",
        Target::Answer(SurveyField::ReadsTerms),
    ),
    (
        "In your opinion who should be responsible for ensuring public Wi-Fi security?",
        Target::Answer(SurveyField::Responsibility),
    ),
    ("Score", Target::Score),
];

/// `(field, pattern, code)`: a value of `field` containing `pattern`
/// (case-insensitive) is stored as `code`. First match wins.
pub const VALUE_RULES: &[(SurveyField, &str, &str)] = &[
    (SurveyField::AwarenessRisk, "high", "High"),
    (SurveyField::AwarenessRisk, "medium", "Medium"),
    (SurveyField::AwarenessRisk, "moderate", "Medium"),
    (SurveyField::AwarenessRisk, "low", "Low"),
];

/// Resolve a raw form key. Form names win; canonical names are the fallback.
pub fn resolve_form_key(key: &str) -> Option<Target> {
    let key = key.trim();
    if let Some((_, target)) = FORM_FIELDS.iter().find(|(name, _)| *name == key) {
        return Some(*target);
    }

    match key {
        "email_address" => Some(Target::Email),
        "score" => Some(Target::Score),
        other => other.parse::<SurveyField>().ok().map(Target::Answer),
    }
}

/// Resolve a seed question key.
pub fn resolve_seed_key(key: &str) -> Option<Target> {
    SEED_QUESTIONS
        .iter()
        .find(|(question, _)| question.eq_ignore_ascii_case(key.trim()))
        .map(|(_, target)| *target)
}

/// Collapse a verbose option label to its canonical code.
///
/// Values matching no rule are returned unchanged.
pub fn canonical_value(field: SurveyField, value: &str) -> String {
    let lowered = value.to_lowercase();

    VALUE_RULES
        .iter()
        .filter(|(rule_field, _, _)| *rule_field == field)
        .find(|(_, pattern, _)| lowered.contains(pattern))
        .map(|(_, _, code)| code.to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Blank input counts as unanswered.
pub fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Write one value into the response according to its target.
pub fn apply(response: &mut SurveyResponse, target: Target, value: &str) {
    let Some(value) = non_blank(value) else {
        return;
    };

    match target {
        Target::Name => response.name = Some(value.to_string()),
        Target::Email => response.email_address = Some(value.to_string()),
        Target::ConnectionFactors => response.connection_factors = Some(value.to_string()),
        Target::Score => response.score = Some(value.to_string()),
        Target::Timestamp => {}
        Target::Answer(field) => response.set(field, Some(canonical_value(field, value))),
    }
}

/// A seed row translated to canonical shape, with its original timestamp.
#[derive(Debug, Clone)]
pub struct SeedRow {
    pub created_at: Option<DateTime<Utc>>,
    pub response: SurveyResponse,
}

/// Normalize one long-form seed row.
pub fn normalize_seed_row(row: &Map<String, Value>) -> SeedRow {
    let mut response = SurveyResponse::default();
    let mut created_at = None;

    for (key, value) in row {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        match resolve_seed_key(key) {
            Some(Target::Timestamp) => created_at = parse_seed_timestamp(&text),
            Some(target) => apply(&mut response, target, &text),
            None => debug!("Ignoring unknown seed column: {}", key),
        }
    }

    if response.connection_factors.is_none() {
        response.connection_factors = Some(NOT_SPECIFIED.to_string());
    }

    SeedRow {
        created_at,
        response,
    }
}

/// Parse the spreadsheet timestamp format used by the seed export.
pub fn parse_seed_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    warn!("Unparseable seed timestamp: {:?}", text);
    None
}

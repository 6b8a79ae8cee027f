//! Response aggregation and statistics.
//!
//! Pure functions turning a slice of stored records into frequency
//! distributions for charts and headline percentages for the results page.
//! Records with no value for the grouped field are skipped everywhere.

use crate::error::SurveyResult;
use crate::models::{StoredRecord, SurveyField};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One bar/slice of a frequency distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub label: String,
    pub count: usize,
}

/// Output order for [`frequency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Ordering {
    /// Order in which each value was first seen
    #[default]
    FirstSeen,
    /// Highest count first; ties keep first-seen order
    #[value(name = "count")]
    CountDesc,
}

/// Tally the values of `field`.
pub fn frequency<'a, I>(records: I, field: SurveyField, order: Ordering) -> Vec<FrequencyEntry>
where
    I: IntoIterator<Item = &'a StoredRecord>,
{
    let mut entries: Vec<FrequencyEntry> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for value in records.into_iter().filter_map(|r| r.get(field)) {
        match index.get(value) {
            Some(&i) => entries[i].count += 1,
            None => {
                index.insert(value, entries.len());
                entries.push(FrequencyEntry {
                    label: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    if order == Ordering::CountDesc {
        // Stable sort keeps first-seen order among equal counts.
        entries.sort_by_key(|e| std::cmp::Reverse(e.count));
    }

    entries
}

/// Secondary restriction for the exploration view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: SurveyField,
    pub value: String,
}

impl Filter {
    /// Parse a filter selection. `"none"` on either side means no filter.
    pub fn parse(field: &str, value: &str) -> SurveyResult<Option<Self>> {
        if field.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("none") {
            return Ok(None);
        }

        Ok(Some(Self {
            field: field.parse()?,
            value: value.to_string(),
        }))
    }

    /// Exact match on the filter field.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        record.get(self.field) == Some(self.value.as_str())
    }
}

/// Filtered, count-ordered distribution of `primary`.
pub fn explore(records: &[StoredRecord], primary: SurveyField, filter: Option<&Filter>) -> Vec<FrequencyEntry> {
    let selected = records
        .iter()
        .filter(|r| filter.map_or(true, |f| f.matches(r)));
    frequency(selected, primary, Ordering::CountDesc)
}

/// Distinct observed values of `field`, first-seen order.
pub fn filter_options(records: &[StoredRecord], field: SurveyField) -> Vec<String> {
    frequency(records, field, Ordering::FirstSeen)
        .into_iter()
        .map(|e| e.label)
        .collect()
}

/// Sum of all counts.
pub fn total(entries: &[FrequencyEntry]) -> usize {
    entries.iter().map(|e| e.count).sum()
}

/// `count` as a whole-number percentage of `total`; zero when `total` is zero.
pub fn share(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// How a summary metric decides that a record counts.
#[derive(Debug, Clone, Copy)]
enum Match {
    Equals(&'static str),
    Contains(&'static str),
    EqualsOrContains(&'static str, &'static str),
}

impl Match {
    fn test(&self, value: &str) -> bool {
        let v = value.trim().to_lowercase();
        match self {
            Match::Equals(expected) => v == *expected,
            Match::Contains(needle) => v.contains(needle),
            Match::EqualsOrContains(expected, needle) => v == *expected || v.contains(needle),
        }
    }
}

/// Percentage metrics on the results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    VpnUsers,
    HighAwareness,
    ThreatEncounter,
    DailyWifi,
    WillingToPay,
}

/// Headline metrics: `(metric, field, predicate)`.
const METRICS: &[(Metric, SurveyField, Match)] = &[
    (
        Metric::VpnUsers,
        SurveyField::SecurityMeasures,
        Match::EqualsOrContains("yes", "always"),
    ),
    (
        Metric::HighAwareness,
        SurveyField::AwarenessRisk,
        Match::Contains("high"),
    ),
    (
        Metric::ThreatEncounter,
        SurveyField::SecurityIssues,
        Match::Equals("yes"),
    ),
    (
        Metric::DailyWifi,
        SurveyField::WifiFrequency,
        Match::Equals("daily"),
    ),
    (
        Metric::WillingToPay,
        SurveyField::PayForWifi,
        Match::Equals("yes"),
    ),
];

/// Key findings shown on the results page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPercentages {
    pub total_responses: usize,
    pub vpn_users_percentage: u32,
    pub high_awareness_percentage: u32,
    pub threat_encounter_percentage: u32,
    pub daily_wifi_percentage: u32,
    pub willing_to_pay_percentage: u32,
}

impl SummaryPercentages {
    fn slot(&mut self, metric: Metric) -> &mut u32 {
        match metric {
            Metric::VpnUsers => &mut self.vpn_users_percentage,
            Metric::HighAwareness => &mut self.high_awareness_percentage,
            Metric::ThreatEncounter => &mut self.threat_encounter_percentage,
            Metric::DailyWifi => &mut self.daily_wifi_percentage,
            Metric::WillingToPay => &mut self.willing_to_pay_percentage,
        }
    }

    /// Metric name → value, including `total_responses`.
    pub fn as_map(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("total_responses", self.total_responses as u64),
            ("vpn_users_percentage", self.vpn_users_percentage as u64),
            ("high_awareness_percentage", self.high_awareness_percentage as u64),
            ("threat_encounter_percentage", self.threat_encounter_percentage as u64),
            ("daily_wifi_percentage", self.daily_wifi_percentage as u64),
            ("willing_to_pay_percentage", self.willing_to_pay_percentage as u64),
        ])
    }

    /// Display rows `(label, value)` in results-page order.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total Survey Responses", self.total_responses.to_string()),
            ("Always Use Security Measures", format!("{}%", self.vpn_users_percentage)),
            ("Report High Risk Awareness", format!("{}%", self.high_awareness_percentage)),
            ("Confirmed a Threat Encounter", format!("{}%", self.threat_encounter_percentage)),
            ("Use Public Wi-Fi Daily", format!("{}%", self.daily_wifi_percentage)),
            ("Willing to Pay for Secure Wi-Fi", format!("{}%", self.willing_to_pay_percentage)),
        ]
    }
}

/// Compute the key findings. Every percentage is over all records.
pub fn summary_percentages(records: &[StoredRecord]) -> SummaryPercentages {
    let total_responses = records.len();
    let mut summary = SummaryPercentages {
        total_responses,
        ..SummaryPercentages::default()
    };

    for (metric, field, predicate) in METRICS {
        let matched = records
            .iter()
            .filter_map(|r| r.get(*field))
            .filter(|v| predicate.test(v))
            .count();
        *summary.slot(*metric) = share(matched, total_responses);
    }

    summary
}

/// Chart style for a dashboard panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Pie,
    Bar,
}

/// Fixed dashboard panels: `(title, field, kind)`.
pub const DASHBOARD_PANELS: &[(&str, SurveyField, ChartKind)] = &[
    ("Risk Awareness Levels", SurveyField::AwarenessRisk, ChartKind::Pie),
    ("Security Measures Usage", SurveyField::SecurityMeasures, ChartKind::Pie),
    ("Feeling of Security", SurveyField::SecurityFeeling, ChartKind::Pie),
    ("Age Group Distribution", SurveyField::AgeGroup, ChartKind::Pie),
    ("Public Wi-Fi Usage Frequency", SurveyField::WifiFrequency, ChartKind::Pie),
    ("Security Threat Encounters", SurveyField::SecurityIssues, ChartKind::Pie),
    ("Occupation Breakdown", SurveyField::Occupation, ChartKind::Bar),
];

/// One rendered dashboard chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPanel {
    pub title: String,
    pub field: SurveyField,
    pub kind: ChartKind,
    pub entries: Vec<FrequencyEntry>,
    pub total: usize,
}

/// Build every fixed dashboard panel.
pub fn dashboard(records: &[StoredRecord]) -> Vec<ChartPanel> {
    DASHBOARD_PANELS
        .iter()
        .map(|(title, field, kind)| {
            let entries = frequency(records, *field, Ordering::FirstSeen);
            ChartPanel {
                title: title.to_string(),
                field: *field,
                kind: *kind,
                total: total(&entries),
                entries,
            }
        })
        .collect()
}

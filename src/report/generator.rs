//! Survey report generation.
//!
//! Builds a [`SurveyReport`] from the record sequence and renders it as
//! Markdown or JSON. The raw records can also be exported as CSV.

use crate::analysis::{
    dashboard, explore, share, summary_percentages, total, ChartKind, ChartPanel, Filter,
    FrequencyEntry, SummaryPercentages,
};
use crate::models::{StoredRecord, SurveyField};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Report header information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    /// Backend the records came from.
    pub source: String,
    pub total_responses: usize,
    pub first_response: Option<DateTime<Utc>>,
    pub last_response: Option<DateTime<Utc>>,
}

/// A filtered, count-ordered breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exploration {
    pub dimension: SurveyField,
    pub filter_field: Option<SurveyField>,
    pub filter_value: Option<String>,
    pub entries: Vec<FrequencyEntry>,
}

impl Exploration {
    pub fn new(records: &[StoredRecord], dimension: SurveyField, filter: Option<&Filter>) -> Self {
        Self {
            dimension,
            filter_field: filter.map(|f| f.field),
            filter_value: filter.map(|f| f.value.clone()),
            entries: explore(records, dimension, filter),
        }
    }
}

/// Everything a rendered report shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyReport {
    pub metadata: ReportMetadata,
    pub summary: SummaryPercentages,
    pub panels: Vec<ChartPanel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exploration: Option<Exploration>,
}

impl SurveyReport {
    /// Aggregate `records` into a report.
    pub fn build(records: &[StoredRecord], source: &str) -> Self {
        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                source: source.to_string(),
                total_responses: records.len(),
                first_response: records.iter().map(|r| r.created_at).min(),
                last_response: records.iter().map(|r| r.created_at).max(),
            },
            summary: summary_percentages(records),
            panels: dashboard(records),
            exploration: None,
        }
    }

    pub fn with_exploration(mut self, exploration: Exploration) -> Self {
        self.exploration = Some(exploration);
        self
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &SurveyReport) -> String {
    let mut output = String::new();

    output.push_str("# Public Wi-Fi Security Survey Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_panels_section(&report.panels));

    if let Some(ref exploration) = report.exploration {
        output.push_str(&generate_exploration_section(exploration));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Source:** {} store\n", metadata.source));
    section.push_str(&format!(
        "- **Total Responses:** {}\n",
        metadata.total_responses
    ));
    if let (Some(first), Some(last)) = (metadata.first_response, metadata.last_response) {
        section.push_str(&format!(
            "- **Collected:** {} to {}\n",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ));
    }
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &SurveyReport) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Key Findings](#key-findings)\n");
    toc.push_str("- [Response Breakdown](#response-breakdown)\n");

    for panel in &report.panels {
        toc.push_str(&format!("  - [{}](#{})\n", panel.title, anchor(&panel.title)));
    }

    if report.exploration.is_some() {
        toc.push_str("- [Detailed Exploration](#detailed-exploration)\n");
    }

    toc.push('\n');

    toc
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' => Some(c),
            ' ' | '-' => Some('-'),
            _ => None,
        })
        .collect()
}

/// Key findings table.
fn generate_summary_section(summary: &SummaryPercentages) -> String {
    let mut section = String::new();

    section.push_str("## Key Findings\n\n");

    if summary.total_responses == 0 {
        section.push_str("No responses have been collected yet.\n\n");
        return section;
    }

    section.push_str("| Finding | Value |\n");
    section.push_str("|:---|:---:|\n");
    for (label, value) in summary.display_rows() {
        section.push_str(&format!("| {} | {} |\n", label, value));
    }
    section.push('\n');

    section
}

fn generate_panels_section(panels: &[ChartPanel]) -> String {
    let mut section = String::new();

    section.push_str("## Response Breakdown\n\n");
    for panel in panels {
        section.push_str(&generate_panel_block(panel));
    }

    section
}

/// One dashboard chart as a table.
fn generate_panel_block(panel: &ChartPanel) -> String {
    let mut block = String::new();

    let kind = match panel.kind {
        ChartKind::Pie => "pie chart",
        ChartKind::Bar => "bar chart",
    };
    block.push_str(&format!("### {}\n\n", panel.title));
    block.push_str(&format!(
        "*{} | {} answers | {}*\n\n",
        panel.field.label(),
        panel.total,
        kind
    ));

    if panel.entries.is_empty() {
        block.push_str("No answers recorded.\n\n");
        return block;
    }

    block.push_str(&generate_entries_table(&panel.entries, panel.total));
    block
}

fn generate_entries_table(entries: &[FrequencyEntry], total: usize) -> String {
    let mut table = String::new();

    table.push_str("| Answer | Count | Share |\n");
    table.push_str("|:---|:---:|:---:|\n");
    for entry in entries {
        table.push_str(&format!(
            "| {} | {} | {}% |\n",
            entry.label.replace('|', "\\|"),
            entry.count,
            share(entry.count, total)
        ));
    }
    table.push('\n');

    table
}

fn generate_exploration_section(exploration: &Exploration) -> String {
    let mut section = String::new();

    section.push_str("## Detailed Exploration\n\n");
    section.push_str(&format!("**Dimension:** {}\n\n", exploration.dimension.label()));
    if let (Some(field), Some(value)) = (exploration.filter_field, &exploration.filter_value) {
        section.push_str(&format!("**Filter:** {} = {}\n\n", field.label(), value));
    }

    if exploration.entries.is_empty() {
        section.push_str("No matching responses.\n\n");
        return section;
    }

    section.push_str(&generate_entries_table(
        &exploration.entries,
        total(&exploration.entries),
    ));
    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by wifisurvey v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &SurveyReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// CSV column order: id, timestamp, identity, answers, free text.
pub fn csv_header() -> Vec<&'static str> {
    let mut header = vec!["id", "created_at", "name", "email_address"];
    header.extend(SurveyField::ALL.iter().map(|f| f.key()));
    header.extend(["connection_factors", "score"]);
    header
}

/// Quote a CSV cell when it contains a delimiter, quote or line break.
fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(cells: &[String]) -> String {
    let mut row = cells
        .iter()
        .map(|c| csv_cell(c))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

/// Export the records as CSV, one row per record in store order.
pub fn generate_csv_export(records: &[StoredRecord]) -> String {
    let header: Vec<String> = csv_header().into_iter().map(String::from).collect();
    let mut output = csv_row(&header);

    for record in records {
        let r = &record.response;
        let mut cells = vec![
            record.id.to_string(),
            record.created_at.to_rfc3339(),
            r.name.clone().unwrap_or_default(),
            r.email_address.clone().unwrap_or_default(),
        ];
        cells.extend(
            SurveyField::ALL
                .iter()
                .map(|f| r.get(*f).unwrap_or_default().to_string()),
        );
        cells.push(r.connection_factors.clone().unwrap_or_default());
        cells.push(r.score.clone().unwrap_or_default());

        output.push_str(&csv_row(&cells));
    }

    output
}

/// Write rendered output to a file.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SurveyResponse;
    use chrono::TimeZone;

    fn record(id: u64, pairs: &[(SurveyField, &str)]) -> StoredRecord {
        let mut response = SurveyResponse::default();
        for (field, value) in pairs {
            response.set(*field, Some(value.to_string()));
        }
        StoredRecord {
            id,
            created_at: Utc.with_ymd_and_hms(2025, 9, 14, 10, id as u32, 0).unwrap(),
            response,
        }
    }

    fn create_test_records() -> Vec<StoredRecord> {
        use SurveyField::*;
        vec![
            record(1, &[(AwarenessRisk, "High"), (WifiFrequency, "Daily"), (Occupation, "Student")]),
            record(2, &[(AwarenessRisk, "Low"), (WifiFrequency, "Weekly"), (Occupation, "Student")]),
            record(3, &[(AwarenessRisk, "High"), (PayForWifi, "Yes"), (Occupation, "Retired")]),
        ]
    }

    #[test]
    fn test_build_report() {
        let report = SurveyReport::build(&create_test_records(), "local");

        assert_eq!(report.metadata.total_responses, 3);
        assert_eq!(report.summary.high_awareness_percentage, 67);
        assert_eq!(report.panels.len(), 7);
        assert_eq!(
            report.metadata.first_response,
            Some(Utc.with_ymd_and_hms(2025, 9, 14, 10, 1, 0).unwrap())
        );
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = SurveyReport::build(&create_test_records(), "local");
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Public Wi-Fi Security Survey Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Key Findings"));
        assert!(markdown.contains("| Report High Risk Awareness | 67% |"));
        assert!(markdown.contains("### Risk Awareness Levels"));
        assert!(markdown.contains("| High | 2 | 67% |"));
        assert!(markdown.contains("[Occupation Breakdown](#occupation-breakdown)"));
        assert!(!markdown.contains("## Detailed Exploration"));
    }

    #[test]
    fn test_markdown_with_exploration() {
        let records = create_test_records();
        let filter = Filter::parse("occupation", "Student").unwrap();
        let report = SurveyReport::build(&records, "remote").with_exploration(Exploration::new(
            &records,
            SurveyField::WifiFrequency,
            filter.as_ref(),
        ));

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("## Detailed Exploration"));
        assert!(markdown.contains("**Filter:** Occupation = Student"));
        assert!(markdown.contains("| Daily | 1 | 50% |"));
    }

    #[test]
    fn test_empty_report() {
        let report = SurveyReport::build(&[], "local");
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("No responses have been collected yet."));
        assert!(markdown.contains("No answers recorded."));
        assert!(!markdown.contains("**Collected:**"));
    }

    #[test]
    fn test_anchor() {
        assert_eq!(anchor("Public Wi-Fi Usage Frequency"), "public-wi-fi-usage-frequency");
    }

    #[test]
    fn test_generate_json_report() {
        let report = SurveyReport::build(&create_test_records(), "local");
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"total_responses\": 3"));
        assert!(json.contains("\"panels\""));
        assert!(json.contains("\"awareness_risk\""));
        assert!(!json.contains("\"exploration\""));
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_cell("Daily"), "Daily");
        assert_eq!(csv_cell("Browsing, Email"), "\"Browsing, Email\"");
        assert_eq!(csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_export() {
        let mut records = create_test_records();
        records[0].response.activities = Some("Email, Banking".to_string());

        let csv = generate_csv_export(&records);
        let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id,created_at,name,email_address,age_group,occupation"));
        assert!(lines[0].ends_with("connection_factors,score"));
        assert!(lines[1].starts_with("1,2025-09-14T10:01:00+00:00,,,"));
        assert!(lines[1].contains("\"Email, Banking\""));
        assert_eq!(lines[1].split(',').count(), csv_header().len() + 1);
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::Ordering;
use crate::config::StoreBackend;
use crate::models::SurveyField;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// wifisurvey - public Wi-Fi security survey collector and analyzer
///
/// Collects questionnaire responses about public Wi-Fi habits, stores them
/// locally or in a managed database, and renders aggregate findings.
///
/// Examples:
///   wifisurvey summary
///   wifisurvey submit --field age_group=18-24 --field wifi_frequency=Daily
///   wifisurvey chart --dimension age_group --filter-field occupation --filter-value Student
///   wifisurvey --backend remote --remote-url https://xyz.supabase.co watch
///   wifisurvey report --format csv --output responses.csv
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .wifisurvey.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Record store backend (overrides config)
    #[arg(long, value_name = "BACKEND", global = true)]
    pub backend: Option<StoreBackend>,

    /// Local JSON data file (overrides config)
    #[arg(long, value_name = "FILE", global = true)]
    pub data_file: Option<PathBuf>,

    /// Do not initialize a missing data file from the bundled dataset
    #[arg(long, global = true)]
    pub no_seed: bool,

    /// Remote store base URL (overrides config)
    #[arg(long, value_name = "URL", env = "WIFISURVEY_REMOTE_URL", global = true)]
    pub remote_url: Option<String>,

    /// Remote store API key (overrides config)
    #[arg(
        long,
        value_name = "KEY",
        env = "WIFISURVEY_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Record a new survey response
    #[command(group(ArgGroup::new("input").required(true).multiple(true).args(["field", "json"])))]
    Submit {
        /// Form answer as key=value (repeatable), e.g. pay_fee=Yes
        #[arg(short, long = "field", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        field: Vec<(String, String)>,

        /// JSON object of form answers
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },

    /// List stored responses
    List,

    /// Show the key findings
    Summary {
        /// Print the metrics as a JSON object
        #[arg(long)]
        json: bool,
    },

    /// Frequency distribution of one question
    Chart {
        /// Question to group by
        #[arg(short, long, value_name = "FIELD", value_parser = parse_field)]
        dimension: SurveyField,

        /// Restrict to responses where this question ... (alone: list its answers)
        #[arg(long, value_name = "FIELD")]
        filter_field: Option<String>,

        /// ... has exactly this answer
        #[arg(long, value_name = "VALUE", requires = "filter_field")]
        filter_value: Option<String>,

        /// Output order (count-ordered when a filter is given)
        #[arg(long, value_name = "ORDER", default_value = "first-seen")]
        order: Ordering,
    },

    /// Show every dashboard chart
    Dashboard,

    /// Write a report file
    Report {
        /// Output format
        #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Output file path (defaults to the configured report path)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Add a detailed exploration of this question
        #[arg(long, value_name = "FIELD", value_parser = parse_field)]
        explore: Option<SurveyField>,

        /// Exploration filter question
        #[arg(long, value_name = "FIELD", requires_all = ["explore", "filter_value"])]
        filter_field: Option<String>,

        /// Exploration filter answer
        #[arg(long, value_name = "VALUE", requires = "filter_field")]
        filter_value: Option<String>,
    },

    /// Keep the key findings on screen, refreshed on every store change
    Watch,

    /// Push the bundled dataset into the store
    Seed,

    /// Generate a default .wifisurvey.toml configuration file
    InitConfig,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// Raw responses as CSV
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_field(s: &str) -> Result<SurveyField, String> {
    s.parse::<SurveyField>().map_err(|e| e.to_string())
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.command, Command::InitConfig) {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.remote_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Remote URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Command::Submit { json: Some(ref path), .. } = self.command {
            if !path.is_file() {
                return Err(format!("JSON input file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            config: None,
            backend: None,
            data_file: None,
            no_seed: false,
            remote_url: None,
            api_key: None,
            verbose: false,
            quiet: false,
            command,
        }
    }

    #[test]
    fn test_parse_submit_fields() {
        let args = Args::try_parse_from([
            "wifisurvey",
            "submit",
            "--field",
            "age_group=18-24",
            "-f",
            "connection_factors=speed = price",
        ])
        .unwrap();

        match args.command {
            Command::Submit { field, json } => {
                assert_eq!(field[0], ("age_group".to_string(), "18-24".to_string()));
                assert_eq!(field[1].1, "speed = price");
                assert!(json.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_submit_requires_input() {
        assert!(Args::try_parse_from(["wifisurvey", "submit"]).is_err());
        assert!(Args::try_parse_from(["wifisurvey", "submit", "--field", "novalue"]).is_err());
    }

    #[test]
    fn test_parse_chart() {
        let args = Args::try_parse_from([
            "wifisurvey",
            "--backend",
            "local",
            "chart",
            "--dimension",
            "Age_Group",
            "--filter-field",
            "occupation",
            "--filter-value",
            "Student",
            "--order",
            "count",
        ])
        .unwrap();

        assert_eq!(args.backend, Some(StoreBackend::Local));
        match args.command {
            Command::Chart {
                dimension,
                filter_field,
                order,
                ..
            } => {
                assert_eq!(dimension, SurveyField::AgeGroup);
                assert_eq!(filter_field.as_deref(), Some("occupation"));
                assert_eq!(order, Ordering::CountDesc);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_chart_filter_field_alone_lists_options() {
        let args = Args::try_parse_from([
            "wifisurvey",
            "chart",
            "--dimension",
            "age_group",
            "--filter-field",
            "occupation",
        ])
        .unwrap();
        match args.command {
            Command::Chart {
                filter_field,
                filter_value,
                ..
            } => {
                assert_eq!(filter_field.as_deref(), Some("occupation"));
                assert!(filter_value.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Args::try_parse_from([
            "wifisurvey",
            "chart",
            "--dimension",
            "age_group",
            "--filter-value",
            "Student",
        ])
        .is_err());
        assert!(Args::try_parse_from(["wifisurvey", "chart", "--dimension", "bogus"]).is_err());
    }

    #[test]
    fn test_validation_remote_url() {
        let mut args = make_args(Command::Summary { json: false });
        args.remote_url = Some("xyz.supabase.co".to_string());
        assert!(args.validate().is_err());

        args.remote_url = Some("https://xyz.supabase.co".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::List);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_json_file() {
        let args = make_args(Command::Submit {
            field: Vec::new(),
            json: Some(PathBuf::from("/nonexistent/answers.json")),
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Summary { json: false });
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_output_extension() {
        assert_eq!(OutputFormat::Csv.extension(), "csv");
        assert_eq!(OutputFormat::default().extension(), "md");
    }
}

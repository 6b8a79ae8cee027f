//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.wifisurvey.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".wifisurvey.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Which record store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON file on this machine, seeded on first use
    #[default]
    Local,
    /// Managed database over HTTP with realtime notifications
    Remote,
}

/// Record store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Local file backend.
    #[serde(default)]
    pub local: LocalConfig,

    /// Remote database backend.
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Local file store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Path of the JSON data file.
    #[serde(default = "default_data_path")]
    pub path: PathBuf,

    /// Initialize a missing data file from the bundled dataset.
    #[serde(default = "default_true")]
    pub seed_on_first_access: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            seed_on_first_access: true,
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("survey_responses.json")
}

fn default_true() -> bool {
    true
}

/// Remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,

    /// API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Responses table name.
    #[serde(default = "default_table")]
    pub table: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Subscribe to realtime change notifications.
    #[serde(default = "default_true")]
    pub realtime: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            table: default_table(),
            timeout_seconds: default_timeout(),
            realtime: true,
        }
    }
}

fn default_table() -> String {
    "survey_responses".to_string()
}

fn default_timeout() -> u64 {
    15
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("survey_report.md")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(backend) = args.backend {
            self.store.backend = backend;
        }
        if let Some(ref path) = args.data_file {
            self.store.local.path = path.clone();
        }
        if args.no_seed {
            self.store.local.seed_on_first_access = false;
        }
        if let Some(ref url) = args.remote_url {
            self.store.remote.url = url.clone();
        }
        if let Some(ref key) = args.api_key {
            self.store.remote.api_key = key.clone();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::Local);
        assert_eq!(config.store.local.path, PathBuf::from("survey_responses.json"));
        assert!(config.store.local.seed_on_first_access);
        assert_eq!(config.store.remote.table, "survey_responses");
        assert!(config.store.remote.realtime);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[store]
backend = "remote"

[store.remote]
url = "https://xyz.supabase.co"
api_key = "anon"
realtime = false

[report]
output = "findings.md"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.store.backend, StoreBackend::Remote);
        assert_eq!(config.store.remote.url, "https://xyz.supabase.co");
        assert!(!config.store.remote.realtime);
        assert_eq!(config.store.remote.timeout_seconds, 15);
        assert_eq!(config.report.output, PathBuf::from("findings.md"));
        // Untouched sections keep their defaults.
        assert!(config.store.local.seed_on_first_access);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[store.local]"));
        assert!(toml_str.contains("[store.remote]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.store.backend, StoreBackend::Local);
    }
}

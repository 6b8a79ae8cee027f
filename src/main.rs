//! wifisurvey - Public Wi-Fi security survey
//!
//! A CLI tool that collects survey responses about public Wi-Fi habits,
//! stores them in a local file or a managed database, and reports the
//! aggregated findings.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (storage, network, config, invalid input, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod session;
mod store;
mod submission;
mod sync;

use analysis::{explore, filter_options, frequency, share, total, Filter, FrequencyEntry, Ordering};
use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{StoredRecord, SurveyField};
use report::{Exploration, SurveyReport};
use session::{DataSession, ViewState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use store::RecordStore;
use submission::{RawFields, Submitter};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("wifisurvey v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .wifisurvey.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to choose the store backend, data file and report path.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Dispatch the selected command.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let store = store::open_store(&config.store)?;

    match args.command {
        Command::Submit { ref field, ref json } => {
            handle_submit(store, field, json.as_deref()).await
        }
        Command::List => handle_list(store.as_ref()).await,
        Command::Summary { json } => handle_summary(store.as_ref(), json).await,
        Command::Chart {
            dimension,
            ref filter_field,
            ref filter_value,
            order,
        } => match options_field(filter_field, filter_value)? {
            Some(field) => handle_filter_options(store.as_ref(), field).await,
            None => {
                let filter = parse_filter(filter_field, filter_value)?;
                handle_chart(store.as_ref(), dimension, filter, order).await
            }
        },
        Command::Dashboard => handle_dashboard(store.as_ref()).await,
        Command::Report {
            format,
            ref output,
            explore,
            ref filter_field,
            ref filter_value,
        } => {
            let filter = parse_filter(filter_field, filter_value)?;
            let output = output
                .clone()
                .unwrap_or_else(|| config.report.output.with_extension(format.extension()));
            handle_report(store.as_ref(), format, &output, explore, filter).await
        }
        Command::Watch => handle_watch(store).await,
        Command::Seed => handle_seed(store).await,
        Command::InitConfig => handle_init_config(),
    }
}

fn parse_filter(field: &Option<String>, value: &Option<String>) -> Result<Option<Filter>> {
    match (field, value) {
        (Some(field), Some(value)) => Ok(Filter::parse(field, value)?),
        _ => Ok(None),
    }
}

/// A filter question without an answer asks for that question's answers.
fn options_field(field: &Option<String>, value: &Option<String>) -> Result<Option<SurveyField>> {
    match (field, value) {
        (Some(field), None) if !field.eq_ignore_ascii_case("none") => Ok(Some(field.parse()?)),
        _ => Ok(None),
    }
}

/// Collect raw form fields from `--field` pairs and an optional JSON file.
/// Pairs given on the command line win over the file.
fn collect_raw_fields(pairs: &[(String, String)], json: Option<&Path>) -> Result<RawFields> {
    let mut raw = RawFields::new();

    if let Some(path) = json {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("{} must contain a JSON object", path.display()))?;

        for (key, value) in object {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => {
                    raw.insert(key, s);
                }
                other => {
                    raw.insert(key, other.to_string());
                }
            }
        }
    }

    for (key, value) in pairs {
        raw.insert(key.clone(), value.clone());
    }

    Ok(raw)
}

async fn handle_submit(
    store: Arc<dyn RecordStore>,
    pairs: &[(String, String)],
    json: Option<&Path>,
) -> Result<()> {
    let raw = collect_raw_fields(pairs, json)?;
    let submitter = Submitter::new(store);

    let record = submitter.submit(&raw).await?;
    println!(
        "✅ Response #{} recorded at {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "   Answered {} of {} questions.",
        record.response.answered_count(),
        SurveyField::ALL.len()
    );
    Ok(())
}

async fn fetch(store: &dyn RecordStore) -> Result<Vec<StoredRecord>> {
    store
        .list_all()
        .await
        .with_context(|| format!("Failed to load responses from {} store", store.backend_tag()))
}

async fn handle_list(store: &dyn RecordStore) -> Result<()> {
    let records = fetch(store).await?;

    if records.is_empty() {
        println!("No responses yet.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<19}  {:<10}  {:<18}  {:<10}  {}",
        "ID", "Submitted", "Age", "Occupation", "Wi-Fi use", "Awareness"
    );
    for record in &records {
        println!(
            "{:>5}  {:<19}  {:<10}  {:<18}  {:<10}  {}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            cell(record, SurveyField::AgeGroup),
            cell(record, SurveyField::Occupation),
            cell(record, SurveyField::WifiFrequency),
            cell(record, SurveyField::AwarenessRisk),
        );
    }
    println!("\n{} responses", records.len());
    Ok(())
}

fn cell(record: &StoredRecord, field: SurveyField) -> &str {
    record.get(field).unwrap_or("-")
}

fn print_summary(records: &[StoredRecord]) {
    let summary = analysis::summary_percentages(records);

    println!("\n📊 Key Findings:");
    for (label, value) in summary.display_rows() {
        println!("   {:<34} {}", label, value);
    }
}

async fn handle_summary(store: &dyn RecordStore, json: bool) -> Result<()> {
    let records = fetch(store).await?;

    if json {
        let metrics = analysis::summary_percentages(&records).as_map();
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        print_summary(&records);
    }
    Ok(())
}

/// Render a frequency distribution as a text bar chart.
fn print_entries(entries: &[FrequencyEntry]) {
    let sum = total(entries);
    if sum == 0 {
        println!("   (no answers)");
        return;
    }

    let width = entries.iter().map(|e| e.label.chars().count()).max().unwrap_or(0);
    for entry in entries {
        let pct = share(entry.count, sum);
        println!(
            "   {:<width$}  {:>4}  {:>3}%  {}",
            entry.label,
            entry.count,
            pct,
            "█".repeat((pct as usize).div_ceil(4)),
            width = width
        );
    }
}

async fn handle_chart(
    store: &dyn RecordStore,
    dimension: SurveyField,
    filter: Option<Filter>,
    order: Ordering,
) -> Result<()> {
    let records = fetch(store).await?;

    let entries = match filter {
        Some(ref filter) => {
            println!(
                "\n📈 {} (where {} = {})",
                dimension.label(),
                filter.field.label(),
                filter.value
            );
            explore(&records, dimension, Some(filter))
        }
        None => {
            println!("\n📈 {}", dimension.label());
            frequency(&records, dimension, order)
        }
    };

    print_entries(&entries);
    Ok(())
}

async fn handle_filter_options(store: &dyn RecordStore, field: SurveyField) -> Result<()> {
    let records = fetch(store).await?;
    let options = filter_options(&records, field);

    println!("\n🔎 Observed answers for {}:", field.label());
    if options.is_empty() {
        println!("   (no answers)");
    }
    for option in options {
        println!("   - {}", option);
    }
    Ok(())
}

async fn handle_dashboard(store: &dyn RecordStore) -> Result<()> {
    let records = fetch(store).await?;

    print_summary(&records);
    for panel in analysis::dashboard(&records) {
        println!("\n📈 {} ({} answers)", panel.title, panel.total);
        print_entries(&panel.entries);
    }
    Ok(())
}

async fn handle_report(
    store: &dyn RecordStore,
    format: OutputFormat,
    output: &Path,
    dimension: Option<SurveyField>,
    filter: Option<Filter>,
) -> Result<()> {
    let records = fetch(store).await?;

    println!("📝 Generating {:?} report...", format);
    let content = match format {
        OutputFormat::Csv => report::generate_csv_export(&records),
        OutputFormat::Markdown | OutputFormat::Json => {
            let mut survey_report = SurveyReport::build(&records, store.backend_tag());
            if let Some(dimension) = dimension {
                survey_report = survey_report.with_exploration(Exploration::new(
                    &records,
                    dimension,
                    filter.as_ref(),
                ));
            }

            if format == OutputFormat::Json {
                report::generate_json_report(&survey_report)?
            } else {
                report::generate_markdown_report(&survey_report)
            }
        }
    };

    report::write_output(&content, output)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    println!(
        "✅ Report with {} responses saved to: {}",
        records.len(),
        output.display()
    );
    Ok(())
}

async fn handle_seed(store: Arc<dyn RecordStore>) -> Result<()> {
    let submitter = Submitter::new(store);
    let count = submitter.seed().await?;
    println!("✅ Inserted {} bundled responses.", count);
    Ok(())
}

/// Keep the key findings on screen until Ctrl-C.
async fn handle_watch(store: Arc<dyn RecordStore>) -> Result<()> {
    let mut session = DataSession::open(store).await;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Loading responses...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let first = session.wait_ready().await;
    spinner.finish_and_clear();
    render_state(&first?);

    if !session.is_live() {
        println!("\n(live updates unavailable for this store; showing a snapshot)");
    }
    println!("\nWatching for changes. Press Ctrl-C to stop.");

    let mut changes = session.changes()?;
    changes.borrow_and_update();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, closing session");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                debug!("View updated: {} records", state.record_count());
                render_state(&state);
            }
        }
    }

    session.close();
    Ok(())
}

fn render_state(state: &ViewState) {
    match state {
        ViewState::Loading => println!("Loading..."),
        ViewState::Empty => println!("\nNo responses yet."),
        ViewState::Ready(records) => print_summary(records),
        ViewState::Failed(message) => println!("\n⚠️  Could not load responses: {}", message),
    }
}

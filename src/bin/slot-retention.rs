//! slot-retention CLI
//!
//! Commands:
//! - extract: Build the feature matrix from a batch of logs
//! - sessions: Dump reconstructed sessions as JSON
//! - validate: Check that every record has a usable timestamp

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

use slot_retention::config::hours_to_ms;
use slot_retention::schema::{validate_records, DirectoryLogStore, LogStore, NdjsonLogStore};
use slot_retention::{FeatureError, PipelineConfig, RawRecord, RetentionProcessor, VERSION};

/// slot-retention - Retention training data from voice slot-machine logs
#[derive(Parser)]
#[command(name = "slot-retention")]
#[command(version = VERSION)]
#[command(about = "Turn slot-machine turn logs into a retention feature matrix", long_about = None)]
struct Cli {
    /// Default log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the feature matrix from a batch of logs
    ///
    /// An empty batch or empty cohort writes an empty matrix.
    Extract {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        windows: WindowArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "matrix.txt")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: OutputFormat,

        /// Also write the reconstructed cohort sessions as JSON
        #[arg(long)]
        sessions_out: Option<PathBuf>,
    },

    /// Dump reconstructed sessions as JSON
    Sessions {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        windows: WindowArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Include users outside the cohort
        #[arg(long)]
        all: bool,
    },

    /// Check that every record has a usable timestamp
    Validate {
        #[command(flatten)]
        input: InputArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Log directory, or NDJSON file (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Input format
    #[arg(long, default_value = "dir")]
    input_format: InputFormat,
}

#[derive(Args)]
struct WindowArgs {
    /// Pipeline configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Processing time (RFC3339), defaults to now
    #[arg(long)]
    now: Option<String>,

    /// Merge sessions closer than this many milliseconds
    #[arg(long)]
    merge_gap_ms: Option<i64>,

    /// Exclude users active within this many hours
    #[arg(long)]
    cohort_hours: Option<i64>,

    /// Count a new session within this many hours as a return
    #[arg(long)]
    return_hours: Option<i64>,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Directory tree <root>/<user>/<session>/<turn>.json
    Dir,
    /// Newline-delimited {user_id, session_id, body} envelopes
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Headerless CSV matrix
    Csv,
    /// JSON report with producer metadata
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), CliFailure> {
    match cli.command {
        Commands::Extract {
            input,
            windows,
            output,
            format,
            sessions_out,
        } => cmd_extract(&input, &windows, &output, format, sessions_out.as_deref()),

        Commands::Sessions {
            input,
            windows,
            output,
            all,
        } => cmd_sessions(&input, &windows, &output, all),

        Commands::Validate { input, json } => cmd_validate(&input, json),
    }
}

fn cmd_extract(
    input: &InputArgs,
    windows: &WindowArgs,
    output: &Path,
    format: OutputFormat,
    sessions_out: Option<&Path>,
) -> Result<(), CliFailure> {
    let processor = RetentionProcessor::with_config(load_config(windows)?)?;
    let now = resolve_now(windows.now.as_deref())?;
    let records = load_records(input)?;

    if records.is_empty() {
        tracing::warn!("No records found in input, writing an empty matrix");
    }

    let result = processor.process(records, now)?;

    let encoder = processor.encoder();
    let output_data = match format {
        OutputFormat::Csv => encoder.encode_csv(&result.features),
        OutputFormat::Json => encoder.encode_to_json(&result.features, now)?,
    };
    write_output(output, &output_data)?;

    if let Some(path) = sessions_out {
        fs::write(path, encoder.encode_sessions_json(&result.cohort)?)?;
    }

    tracing::info!(
        "Wrote {} rows ({} users seen)",
        result.features.len(),
        result.users_seen
    );
    Ok(())
}

fn cmd_sessions(
    input: &InputArgs,
    windows: &WindowArgs,
    output: &Path,
    all: bool,
) -> Result<(), CliFailure> {
    let processor = RetentionProcessor::with_config(load_config(windows)?)?;
    let records = load_records(input)?;

    let users = if all {
        processor.reconstruct(records)?
    } else {
        processor.cohort(records, resolve_now(windows.now.as_deref())?)?
    };

    let json = processor.encoder().encode_sessions_json(&users)?;
    write_output(output, &(json + "\n"))
}

fn cmd_validate(input: &InputArgs, json: bool) -> Result<(), CliFailure> {
    let records = load_records(input)?;
    let failures = validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - failures.len(),
        invalid_records: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                user_id: f.user_id.clone(),
                session_id: f.session_id.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - {}/{} (index {}): {}",
                    err.user_id, err.session_id, err.index, err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(CliFailure::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

// Helper functions

fn load_records(input: &InputArgs) -> Result<Vec<RawRecord>, CliFailure> {
    let is_stdin = input.input.to_string_lossy() == "-";

    let records = match input.input_format {
        InputFormat::Dir if is_stdin => {
            return Err(CliFailure::Usage(
                "stdin input requires --input-format ndjson".to_string(),
            ))
        }
        InputFormat::Dir => DirectoryLogStore::new(&input.input).load()?,
        InputFormat::Ndjson if is_stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            NdjsonLogStore::new(buffer).load()?
        }
        InputFormat::Ndjson => NdjsonLogStore::from_path(&input.input)?.load()?,
    };

    tracing::debug!("Loaded {} records", records.len());
    Ok(records)
}

fn load_config(windows: &WindowArgs) -> Result<PipelineConfig, CliFailure> {
    let mut config = match &windows.config {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };

    if let Some(gap) = windows.merge_gap_ms {
        config.merge_gap_ms = gap;
    }
    if let Some(hours) = windows.cohort_hours {
        config.cohort_window_ms = hours_to_ms(hours)
            .map_err(|e| CliFailure::Usage(format!("Invalid --cohort-hours: {e}")))?;
    }
    if let Some(hours) = windows.return_hours {
        config.return_window_ms = hours_to_ms(hours)
            .map_err(|e| CliFailure::Usage(format!("Invalid --return-hours: {e}")))?;
    }

    Ok(config)
}

fn resolve_now(now: Option<&str>) -> Result<DateTime<Utc>, CliFailure> {
    match now {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CliFailure::Usage(format!("Invalid --now {s:?}: {e}"))),
        None => Ok(Utc::now()),
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), CliFailure> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Feature(FeatureError),
    Json(serde_json::Error),
    Usage(String),
    ValidationFailed(usize),
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<FeatureError> for CliFailure {
    fn from(e: FeatureError) -> Self {
        CliFailure::Feature(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliFailure::Feature(e) => {
                let hint = match &e {
                    FeatureError::MissingField(_) | FeatureError::DateParseError(_) => {
                        "Run 'slot-retention validate' to list bad records"
                    }
                    FeatureError::InvalidConfig(_) => "Check the configuration windows",
                    _ => "Ensure every log file is a JSON turn record",
                };
                CliError {
                    code: "PIPELINE_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CliFailure::Usage(msg) => CliError {
                code: "USAGE_ERROR".to_string(),
                message: msg,
                hint: Some("See --help".to_string()),
            },
            CliFailure::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix or remove the listed records and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    user_id: String,
    session_id: String,
    error: String,
}

//! tabload CLI - move tabular user records into PostgreSQL.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tabload::{Credentials, LoadMode, Pipeline, PipelineError, Settings, Source};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "tabload")]
#[command(about = "Extract, normalize and load tabular user records into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Data source: api, file or db
    #[arg(long)]
    source: String,

    /// Load mode: copy or upsert
    #[arg(long)]
    load_mode: String,

    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config/settings.yaml")]
    config: PathBuf,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), PipelineError> {
    let cli = Cli::parse();

    // Reject unsupported source/mode before touching config, credentials or
    // any source system.
    let source: Source = cli.source.parse()?;
    let mode: LoadMode = cli.load_mode.parse()?;

    setup_logging(&cli.verbosity, &cli.log_format);

    let settings = Settings::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let credentials = Credentials::from_env(source)?;

    let pipeline = Pipeline::new(settings, credentials);
    let result = pipeline.run(source, mode).await?;

    if cli.output_json {
        println!("{}", result.to_json()?);
    } else {
        println!("\nPipeline completed!");
        println!("  Run ID: {}", result.run_id);
        println!("  Duration: {:.2}s", result.duration_seconds);
        println!("  Source: {}", result.source);
        println!("  Extracted: {} rows", result.rows_extracted);
        println!(
            "  Loaded: {} rows into {} ({})",
            result.rows_loaded, result.target_table, result.load_mode
        );
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

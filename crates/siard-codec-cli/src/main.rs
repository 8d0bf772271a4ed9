//! siard-codec CLI - decode archived tables or extract live ones as JSON lines.

use clap::{Parser, Subcommand};
use serde_json::json;
use siard_codec::report::Anomaly;
use siard_codec::{
    Archive, ArchiveReader, Catalog, CodecError, CollectingReporter, Config, Extractor,
    JsonLinesSink, PgConnection, RunSummary, TableDescriptor,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "siard-codec")]
#[command(about = "Decode archived tables and extract live ones as typed rows")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Write the run summary and every anomaly to this JSON file
    #[arg(long)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode archive tables into JSON lines
    Decode {
        /// Only this table (schema.table)
        #[arg(long)]
        table: Option<String>,

        /// Write rows to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Extract tables from the source database into JSON lines
    Extract {
        /// Only this table (schema.table)
        #[arg(long)]
        table: Option<String>,

        /// Write rows to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Test the source database connection
    HealthCheck,

    /// List catalog tables and column types
    Tables,
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

async fn run() -> Result<(), CodecError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(CodecError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Decode { ref table, ref output } => {
            let archive_config = config.require_archive("decode")?.clone();
            let catalog = load_catalog(&cli.config, &config)?;
            let tables = select_tables(&catalog, table.as_deref())?;
            let output = output.clone();
            let cancel = setup_signal_handler();

            let (summary, anomalies) = blocking(move || {
                let reporter = CollectingReporter::new();
                let summary = Archive::open(&archive_config).and_then(|archive| {
                    let reader =
                        ArchiveReader::new(archive, &catalog, &reporter).with_cancel(cancel);
                    let mut sink = JsonLinesSink::new(open_output(output.as_deref())?);
                    reader.decode_tables(tables, &mut sink)
                });
                (summary, reporter.anomalies())
            })
            .await?;
            finish_run(&cli, &config, summary, anomalies)?;
        }

        Commands::Extract { ref table, ref output } => {
            let source_config = config.require_source("extract")?.clone();
            let ladder = config.fetch.ladder();
            let catalog = load_catalog(&cli.config, &config)?;
            let tables = select_tables(&catalog, table.as_deref())?;
            let output = output.clone();
            let cancel = setup_signal_handler();
            let handle = Handle::current();

            let (summary, anomalies) = blocking(move || {
                let reporter = CollectingReporter::new();
                let summary = PgConnection::connect(&source_config, handle).and_then(|conn| {
                    let mut extractor =
                        Extractor::new(conn, ladder, &reporter).with_cancel(cancel);
                    let mut sink = JsonLinesSink::new(open_output(output.as_deref())?);
                    extractor.extract_tables(tables, &mut sink)
                });
                (summary, reporter.anomalies())
            })
            .await?;
            finish_run(&cli, &config, summary, anomalies)?;
        }

        Commands::HealthCheck => {
            let source_config = config.require_source("health-check")?.clone();
            let handle = Handle::current();
            let started = Instant::now();

            let result = blocking(move || {
                PgConnection::connect(&source_config, handle).and_then(|conn| conn.health_check())
            })
            .await?;
            let latency_ms = started.elapsed().as_millis() as u64;

            if cli.output_json {
                let report = match &result {
                    Ok(version) => json!({
                        "source_connected": true,
                        "latency_ms": latency_ms,
                        "version": version,
                    }),
                    Err(e) => json!({
                        "source_connected": false,
                        "latency_ms": latency_ms,
                        "error": e.to_string(),
                    }),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                match &result {
                    Ok(version) => {
                        println!("  Source (PostgreSQL): OK ({}ms)", latency_ms);
                        println!("    {}", version);
                    }
                    Err(e) => {
                        println!("  Source (PostgreSQL): FAILED ({}ms)", latency_ms);
                        println!("    Error: {}", e);
                    }
                }
            }
            result?;
        }

        Commands::Tables => {
            let catalog = load_catalog(&cli.config, &config)?;
            let tables = catalog.tables();

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in &tables {
                    println!(
                        "{} (content/{}/{})",
                        table.id,
                        table.schema_folder.as_deref().unwrap_or("?"),
                        table.folder.as_deref().unwrap_or("?")
                    );
                    for column in &table.columns {
                        println!("  {}: {}", column.name, column.ty);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Run synchronous codec work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, CodecError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CodecError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
}

/// Catalog paths are relative to the configuration file.
fn load_catalog(config_path: &Path, config: &Config) -> Result<Catalog, CodecError> {
    let path = match config_path.parent() {
        Some(dir) if config.catalog.is_relative() => dir.join(&config.catalog),
        _ => config.catalog.clone(),
    };
    let catalog = Catalog::load(&path)?;
    info!(
        "Loaded catalog from {:?} ({} tables)",
        path,
        catalog.tables().len()
    );
    Ok(catalog)
}

fn select_tables(
    catalog: &Catalog,
    table: Option<&str>,
) -> Result<Vec<TableDescriptor>, CodecError> {
    match table {
        Some(id) => Ok(vec![catalog.table(id)?]),
        None => Ok(catalog.tables()),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write + Send>, CodecError> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

/// Print the summary, write the report file, and turn failures into an exit code.
fn finish_run(
    cli: &Cli,
    config: &Config,
    summary: Result<RunSummary, CodecError>,
    anomalies: Vec<Anomaly>,
) -> Result<(), CodecError> {
    let summary = summary.map(|mut s| {
        s.config_hash = Some(config.hash());
        s
    });

    if let Some(path) = &cli.report {
        let report = json!({
            "summary": summary.as_ref().ok(),
            "error": summary.as_ref().err().map(|e| e.to_string()),
            "anomalies": anomalies,
        });
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Wrote report to {:?}", path);
    }

    let summary = summary?;
    if cli.output_json {
        eprintln!("{}", summary.to_json()?);
    } else {
        eprintln!("\nRun {}!", summary.status);
        eprintln!("  Run ID: {}", summary.run_id);
        eprintln!("  Duration: {:.2}s", summary.duration_seconds);
        eprintln!("  Tables: {}/{}", summary.tables_success, summary.tables_total);
        eprintln!("  Rows: {}", summary.rows_delivered);
        eprintln!("  Throughput: {} rows/sec", summary.rows_per_second);
        eprintln!("  Anomalies: {}", summary.anomalies);
        for failed in &summary.failed_tables {
            eprintln!("  Failed: {}: {}", failed.table, failed.error);
        }
    }

    if summary.status == "cancelled" {
        return Err(CodecError::Cancelled);
    }
    summary.check()
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Rows go to stdout; logs stay on stderr.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Raise the returned flag on SIGINT or SIGTERM; runs stop between rows.
#[cfg(unix)]
fn setup_signal_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let flag = Arc::clone(&cancel);
        tokio::spawn(async move {
            let Ok(mut stream) = signal(kind) else {
                return;
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Stopping after the current row...", name);
            flag.store(true, Ordering::Relaxed);
        });
    }

    cancel
}

/// Signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current row...");
            flag.store(true, Ordering::Relaxed);
        }
    });

    cancel
}

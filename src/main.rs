use fault_ledger::analysis::{AnalysisReport, HistorySummary};
use fault_ledger::{
    report_file_name, ExportRequest, Granularity, Ingestor, IngestionReport, LedgerConfig,
    LedgerError, RecordFilter, RepeatFaultAnalyzer,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fault-ledger")]
#[command(about = "Ticket export ingestion and repeat-fault reporting")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// History file (overrides configuration and LEDGER_HISTORY_PATH)
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one ticket export into history
    Ingest {
        /// Export file (.csv or .xlsx)
        file: PathBuf,

        /// Format hint, defaults to the file extension
        #[arg(long)]
        format: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Repeat-fault report over history
    Report {
        /// zone, area_group or block
        #[arg(long)]
        granularity: Option<Granularity>,

        /// Report locations with more tickets than this
        #[arg(long)]
        threshold: Option<u32>,

        /// Report addresses with more distinct tickets than this
        #[arg(long)]
        address_threshold: Option<u32>,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        json: bool,
    },
    /// Write history to a spreadsheet
    Export {
        /// Output file, or a directory to receive report_YYYYMMDD.xlsx
        out: PathBuf,

        /// Comma-separated columns to include (default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Headline counts for the whole history
    Summary {
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    zone: Option<String>,

    #[arg(long)]
    area_group: Option<String>,

    #[arg(long)]
    block: Option<String>,

    #[arg(long)]
    status: Option<String>,

    /// Only snapshots at or after this RFC 3339 instant
    #[arg(long)]
    since: Option<DateTime<Utc>>,
}

impl From<FilterArgs> for RecordFilter {
    fn from(args: FilterArgs) -> Self {
        RecordFilter {
            zone: args.zone,
            area_group: args.area_group,
            block: args.block,
            status: args.status,
            since: args.since,
        }
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref(), args.history)?;
    info!("History store: {}", config.history_path.display());

    match args.command {
        Commands::Ingest { file, format, json } => run_ingest(&config, &file, format, json),
        Commands::Report {
            granularity,
            threshold,
            address_threshold,
            filter,
            json,
        } => {
            let mut config = config;
            if let Some(granularity) = granularity {
                config.granularity = granularity;
            }
            if let Some(threshold) = threshold {
                config.location_threshold = threshold;
            }
            if let Some(threshold) = address_threshold {
                config.address_threshold = threshold;
            }
            run_report(&config, filter.into(), json)
        }
        Commands::Export {
            out,
            columns,
            filter,
        } => run_export(&config, &out, ExportRequest { columns }, filter.into()),
        Commands::Summary { json } => run_summary(&config, json),
    }
}

fn load_config(path: Option<&Path>, history: Option<PathBuf>) -> Result<LedgerConfig> {
    let mut config = match path {
        Some(path) => {
            let mut config = LedgerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
        None => LedgerConfig::from_env()?,
    };
    if let Some(history) = history {
        config.history_path = history;
    }
    config.validate()?;
    Ok(config)
}

/// Attach the failing pipeline step to a core error.
fn step_failed(err: LedgerError) -> anyhow::Error {
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("{} step failed", stage))
}

fn run_ingest(
    config: &LedgerConfig,
    file: &Path,
    format: Option<String>,
    json: bool,
) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let hint = format.unwrap_or_else(|| file.to_string_lossy().into_owned());

    let ingestor = Ingestor::from_config(config).map_err(step_failed)?;
    let report = ingestor.ingest(&bytes, &hint).map_err(step_failed)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_ingestion(&report);
    }
    Ok(())
}

fn run_report(config: &LedgerConfig, filter: RecordFilter, json: bool) -> Result<()> {
    let ingestor = Ingestor::from_config(config).map_err(step_failed)?;
    let report = ingestor.analyze(&filter).map_err(step_failed)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_analysis(&report, ingestor.analyzer());
    }
    Ok(())
}

fn run_export(
    config: &LedgerConfig,
    out: &Path,
    request: ExportRequest,
    filter: RecordFilter,
) -> Result<()> {
    let ingestor = Ingestor::from_config(config).map_err(step_failed)?;
    let bytes = ingestor.export(&filter, &request).map_err(step_failed)?;

    let target = if out.is_dir() {
        out.join(report_file_name(Utc::now().date_naive()))
    } else {
        out.to_path_buf()
    };
    fs::write(&target, &bytes).with_context(|| format!("Failed to write {}", target.display()))?;
    println!("Wrote {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

fn run_summary(config: &LedgerConfig, json: bool) -> Result<()> {
    let ingestor = Ingestor::from_config(config).map_err(step_failed)?;
    let history = ingestor.filtered_history(&RecordFilter::default()).map_err(step_failed)?;
    let summary = ingestor.analyzer().summary(history.records()).map_err(step_failed)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_ingestion(report: &IngestionReport) {
    println!("\n{}", "=".repeat(60));
    println!(" INGESTION {}", report.run_id);
    println!("{}", "=".repeat(60));
    println!(" Snapshot:        {}", report.snapshot_time);
    println!(" Header row:      {}", report.header_row);
    println!(
        " Rows kept:       {} of {} ({} dropped)",
        report.cleaning.kept_rows,
        report.cleaning.input_rows,
        report.cleaning.dropped()
    );
    println!(
        " Locations:       {} derived, {} skipped",
        report.decomposition.decomposed,
        report.decomposition.skipped()
    );
    println!(" New tickets:     {}", report.new_record_count);
    println!(" History total:   {}", report.total_history_count);
    for warning in &report.warnings {
        println!(" Warning: {}", warning);
    }
}

fn print_summary(summary: &HistorySummary) {
    println!(" Tickets in history:    {}", summary.total_records);
    println!(" Distinct zones:        {}", summary.distinct_zone_count);
    println!(" Distinct area groups:  {}", summary.distinct_area_group_count);
    println!(" Without location:      {}", summary.records_without_location);
}

fn print_analysis(report: &AnalysisReport, analyzer: &RepeatFaultAnalyzer) {
    println!("\n{}", "=".repeat(60));
    println!(" REPEAT FAULTS ({})", report.granularity);
    println!("{}", "=".repeat(60));
    print_summary(&report.summary);

    if let Some(locations) = &report.location_repeats {
        println!("\n Locations with more than {} tickets:", analyzer.location_threshold);
        if locations.is_empty() {
            println!("   (none)");
        }
        for repeat in locations {
            println!("   {:>4}  {}", repeat.count, repeat.key().iter().join(" / "));
        }
    }

    if let Some(addresses) = &report.address_repeats {
        println!("\n Addresses with more than {} distinct tickets:", analyzer.address_threshold);
        if addresses.is_empty() {
            println!("   (none)");
        }
        for repeat in addresses {
            println!("   {:>4}  {}", repeat.distinct_tickets, repeat.sample_address);
        }
    }

    for skipped in &report.skipped {
        println!("\n Skipped {}: {}", skipped.table, skipped.reason);
    }
}

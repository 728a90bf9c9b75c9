//! altdata CLI: snapshot loading, reloads, status, export and market history.
//!
//! Commands:
//! - `load` reads a dataset from its snapshot, extracting on a miss
//! - `reload` re-extracts one POS dataset (or all three) and overwrites snapshots
//! - `status` reports which snapshots exist and what they hold
//! - `export` writes a loaded dataset as CSV
//! - `market` fetches daily history from Yahoo Finance into the market snapshot
//! - `funda` converts quarterly levels to YoY log differences in the object store

use altdata_core::data::frame::decode_parquet;
use altdata_core::data::{
    fetch_market_history, CircuitBreaker, DatasetKind, LocalObjectStore, ParquetExtractLoader,
    YahooProvider,
};
use altdata_core::domain::WideTable;
use altdata_runner::register::{FundamentalSource, FUNDAMENTAL_KEY, MARKET_FILE};
use altdata_runner::{
    load_dataset, register_fundamental, reload, reload_all_pos, write_csv, DataHandler,
    LoadOptions, LoadedDataset, PipelineConfig, PipelineContext,
};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "altdata", about = "altdata CLI: POS alternative-data snapshots")]
struct Cli {
    /// Pipeline config (TOML). Defaults apply when the file is absent.
    #[arg(long, global = true, default_value = "altdata.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Window {
    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    end: Option<String>,

    /// Database name, overriding config and environment.
    #[arg(long)]
    db_name: Option<String>,

    /// Schema name, overriding config.
    #[arg(long)]
    schema: Option<String>,

    /// Restrict the extract to these tickers.
    #[arg(long, num_args = 1..)]
    tickers: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a dataset from its snapshot, extracting on a miss.
    Load {
        /// Dataset slug, e.g. pos_retailer.
        dataset: String,

        #[command(flatten)]
        window: Window,

        /// Ignore an existing snapshot.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Re-extract and overwrite a snapshot. `all-pos` reloads the three POS datasets.
    Reload {
        dataset: String,

        #[command(flatten)]
        window: Window,
    },
    /// Report snapshot presence, size and shape.
    Status,
    /// Write a dataset as CSV.
    Export {
        dataset: String,

        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        window: Window,
    },
    /// Fetch daily market history and store it as the market snapshot.
    Market {
        #[arg(long, required = true, num_args = 1..)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,
    },
    /// Store year-over-year fundamentals computed from a wide Parquet file of levels.
    Funda {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Load {
            dataset,
            window,
            force,
        } => run_load(config, &dataset, window, force),
        Commands::Reload { dataset, window } => run_reload(config, &dataset, window),
        Commands::Status => run_status(&config),
        Commands::Export {
            dataset,
            out,
            window,
        } => run_export(config, &dataset, &out, window),
        Commands::Market {
            tickers,
            start,
            end,
        } => run_market(&config, &tickers, &start, end.as_deref()),
        Commands::Funda { input } => run_funda(config, &input),
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    if path.exists() {
        PipelineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        Ok(PipelineConfig::default())
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn parse_dataset(s: &str) -> Result<DatasetKind> {
    s.parse::<DatasetKind>().map_err(anyhow::Error::msg)
}

fn load_options(window: Window, force: bool) -> Result<LoadOptions> {
    Ok(LoadOptions {
        start: window.start.as_deref().map(parse_date).transpose()?,
        end: window.end.as_deref().map(parse_date).transpose()?,
        db_name: window.db_name,
        schema_name: window.schema,
        tickers: (!window.tickers.is_empty()).then_some(window.tickers),
        force,
    })
}

/// Run `f` with a context wired to the configured extract and object roots.
fn with_context<T>(
    config: PipelineConfig,
    f: impl FnOnce(&PipelineContext<'_>) -> Result<T>,
) -> Result<T> {
    let loader = ParquetExtractLoader::new(config.extract_dir.clone());
    let objects = LocalObjectStore::new(config.object_store_root.clone());
    let ctx = PipelineContext::new(config, &loader, &objects);
    f(&ctx)
}

fn run_load(config: PipelineConfig, dataset: &str, window: Window, force: bool) -> Result<()> {
    let kind = parse_dataset(dataset)?;
    let opts = load_options(window, force)?;
    let loaded = with_context(config, |ctx| Ok(load_dataset(ctx, kind, &opts)?))?;
    print_loaded(&loaded);
    Ok(())
}

fn run_reload(config: PipelineConfig, dataset: &str, window: Window) -> Result<()> {
    let opts = load_options(window, true)?;
    if dataset == "all-pos" {
        let tickers = with_context(config, |ctx| Ok(reload_all_pos(ctx, &opts)?))?;
        println!("Reloaded POS datasets covering {} ticker(s).", tickers.len());
        return Ok(());
    }

    let kind = parse_dataset(dataset)?;
    let loaded = with_context(config, |ctx| Ok(reload(ctx, kind, &opts)?))?;
    print_loaded(&loaded);
    Ok(())
}

fn run_status(config: &PipelineConfig) -> Result<()> {
    let store = altdata_core::data::SnapshotStore::new(config.data_dir.clone());
    let mut files: Vec<&str> = DatasetKind::ALL
        .iter()
        .filter_map(|k| k.snapshot_file())
        .collect();
    files.push(MARKET_FILE);

    println!("Snapshot directory: {}", config.data_dir.display());
    println!();
    println!("{:<32} {:>10} {:>8} {:>8}  Range", "File", "Size", "Rows", "Tickers");
    println!("{}", "-".repeat(82));

    for status in store.status(&files) {
        if !status.present {
            println!("{:<32} {:>10}", status.file_name, "missing");
            continue;
        }
        let size = format_size(status.size_bytes.unwrap_or(0));
        match status.meta {
            Some(meta) => {
                let range = match (meta.start, meta.end) {
                    (Some(s), Some(e)) => format!("{} to {}", s.date(), e.date()),
                    _ => "-".to_string(),
                };
                println!(
                    "{:<32} {:>10} {:>8} {:>8}  {range}",
                    status.file_name, size, meta.rows, meta.entities
                );
            }
            None => println!("{:<32} {:>10} {:>8} {:>8}  -", status.file_name, size, "?", "?"),
        }
    }
    Ok(())
}

fn run_export(config: PipelineConfig, dataset: &str, out: &Path, window: Window) -> Result<()> {
    let kind = parse_dataset(dataset)?;
    let opts = load_options(window, false)?;
    let loaded = with_context(config, |ctx| Ok(load_dataset(ctx, kind, &opts)?))?;
    write_csv(&loaded.table, out)?;
    println!("Wrote {} row(s) to {}", loaded.table.len(), out.display());
    Ok(())
}

fn run_market(
    config: &PipelineConfig,
    tickers: &[String],
    start: &str,
    end: Option<&str>,
) -> Result<()> {
    let start = parse_date(start)?;
    let end = end
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    if start > end {
        bail!("start {start} is after end {end}");
    }

    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(breaker)?;
    let history = fetch_market_history(&provider, tickers, start, end, &config.exchange_suffix)?;

    let store = altdata_core::data::SnapshotStore::new(config.data_dir.clone());
    let meta = store.write(MARKET_FILE, &history.table, "yahoo")?;
    println!(
        "Stored {} row(s) for {} ticker(s) in {}",
        meta.rows,
        meta.entities,
        store.path(MARKET_FILE).display()
    );
    for ticker in &history.missing {
        eprintln!("No market data for {ticker}");
    }
    Ok(())
}

fn run_funda(config: PipelineConfig, input: &Path) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let levels: WideTable = decode_parquet(bytes)?;
    let bucket = config.bucket.clone();

    let mut handler = DataHandler::new();
    let id = with_context(config, |ctx| {
        Ok(register_fundamental(
            &mut handler,
            ctx,
            FundamentalSource::Fresh(levels),
        )?)
    })?;
    let table = handler.get_raw_data(id)?;
    println!(
        "Stored {} row(s) of YoY fundamentals at {bucket}/{FUNDAMENTAL_KEY}",
        table.len()
    );
    Ok(())
}

fn print_loaded(loaded: &LoadedDataset) {
    let table = &loaded.table;
    println!();
    println!("=== {} ===", loaded.kind);
    println!("Source:   {:?}", loaded.source);
    println!("Rows:     {}", table.len());
    println!("Tickers:  {}", table.entities().len());
    println!("Columns:  {}", table.columns().collect::<Vec<_>>().join(", "));
    if let Some((start, end)) = table.time_range() {
        println!("Period:   {} to {}", start.date(), end.date());
    }
    if let Some(summary) = &loaded.reconcile {
        println!(
            "Generations: {} row(s) kept from gen1, {} from gen2, {} superseded",
            summary.from_gen1, summary.from_gen2, summary.superseded
        );
    }
    println!();
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

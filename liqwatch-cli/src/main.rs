//! LiqWatch CLI — refresh, inspect, export, and cache management commands.
//!
//! Commands:
//! - `refresh` — force-refresh the configured universe (or the given tickers)
//! - `show` — print the latest feature rows for a ticker
//! - `backtest` — summarize a date range: cumulative return, anomalies, illiquidity
//! - `export` — write a ticker's feature table as CSV or JSON
//! - `cache status` / `cache invalidate` — inspect or drop cached tables
//! - `config init` — write a default config file

mod export;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use liqwatch_core::cache::{FeatureCache, ParquetFeatureCache};
use liqwatch_core::config::{default_config_path, LOCAL_CONFIG_FILE};
use liqwatch_core::pipeline::{PipelineError, RefreshProgress, RefreshSummary};
use liqwatch_core::view::{self, BacktestView};
use liqwatch_core::{FeatureTable, LiqwatchConfig, LiquidityPipeline};

#[derive(Parser)]
#[command(
    name = "liqwatch",
    about = "LiqWatch CLI — Amihud illiquidity features and anomaly flags"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the cache directory from the config.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Keep computed tables in memory only.
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Force-refresh tickers (defaults to the configured universe).
    Refresh {
        /// Tickers to refresh instead of the universe.
        tickers: Vec<String>,
    },
    /// Print the most recent feature rows for a ticker.
    Show {
        ticker: String,

        /// Number of trailing rows to print.
        #[arg(long, default_value_t = 20)]
        rows: usize,

        /// Only print anomalous rows.
        #[arg(long, default_value_t = false)]
        anomalies: bool,
    },
    /// Summarize a date range (defaults to the last 60 rows).
    Backtest {
        ticker: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,
    },
    /// Export a ticker's feature table.
    Export {
        ticker: String,

        /// Output file. Prints to stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached tickers, date ranges, anomaly counts, and size.
    Status,
    /// Drop cached tables so the next request recomputes them.
    Invalidate {
        #[arg(required = true)]
        tickers: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration.
    Init {
        /// Destination. Defaults to ./liqwatch.toml.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init { path, force } => run_config_init(path.as_deref(), *force),
            ConfigAction::Show => run_config_show(&load_config(&cli)?),
        };
    }

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Refresh { tickers } => run_refresh(config, tickers, cli.no_cache),
        Commands::Show {
            ticker,
            rows,
            anomalies,
        } => {
            let table = fetch_table(&config, &ticker, cli.no_cache)?;
            print_rows(&table, rows, anomalies);
            Ok(())
        }
        Commands::Backtest { ticker, start, end } => {
            let table = fetch_table(&config, &ticker, cli.no_cache)?;
            run_backtest(&table, start.as_deref(), end.as_deref())
        }
        Commands::Export {
            ticker,
            output,
            format,
        } => {
            let table = fetch_table(&config, &ticker, cli.no_cache)?;
            run_export(&table, output.as_deref(), format)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config),
            CacheAction::Invalidate { tickers } => run_cache_invalidate(&config, &tickers),
        },
        Commands::Config { .. } => Ok(()),
    }
}

fn load_config(cli: &Cli) -> Result<LiqwatchConfig> {
    let mut config = LiqwatchConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = dir.clone();
    }
    Ok(config)
}

fn build_pipeline(config: &LiqwatchConfig, no_cache: bool) -> Result<LiquidityPipeline> {
    let pipeline = if no_cache {
        LiquidityPipeline::from_config_in_memory(config)?
    } else {
        LiquidityPipeline::from_config(config)?
    };
    Ok(pipeline)
}

fn fetch_table(config: &LiqwatchConfig, ticker: &str, no_cache: bool) -> Result<FeatureTable> {
    let pipeline = build_pipeline(config, no_cache)?;
    let table = pipeline.get_or_compute(ticker)?;
    pipeline.close()?;
    Ok(table)
}

// ── refresh ──────────────────────────────────────────────────────────

/// Progress reporter that prints to stdout.
struct StdoutProgress;

impl RefreshProgress for StdoutProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}/{total}] Refreshing {ticker}...", index + 1);
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), PipelineError>,
    ) {
        match result {
            Ok(()) => println!("  {ticker}: OK"),
            Err(e) => {
                tracing::warn!(ticker, error = %e, "refresh failed");
                println!("  {ticker}: FAILED ({e})");
            }
        }
    }

    fn on_batch_complete(&self, summary: &RefreshSummary) {
        println!();
        println!(
            "Refreshed {}/{} ticker(s), {} failed.",
            summary.succeeded.len(),
            summary.total,
            summary.failed.len()
        );
    }
}

fn run_refresh(mut config: LiqwatchConfig, tickers: Vec<String>, no_cache: bool) -> Result<()> {
    if !tickers.is_empty() {
        config.universe = tickers;
    }
    let pipeline = build_pipeline(&config, no_cache)?;
    let summary = pipeline.refresh_universe(&StdoutProgress);
    pipeline.close()?;

    if !summary.all_succeeded() {
        for (ticker, err) in &summary.failed {
            eprintln!("Error for {ticker}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

// ── show / backtest / export ─────────────────────────────────────────

fn print_rows(table: &FeatureTable, limit: usize, anomalies_only: bool) {
    let rows: Vec<_> = table
        .rows
        .iter()
        .filter(|r| !anomalies_only || r.anomaly)
        .collect();
    let shown = &rows[rows.len().saturating_sub(limit)..];

    println!(
        "{}: {} rows, {} anomalies",
        table.ticker,
        table.len(),
        table.anomaly_count()
    );
    println!();
    println!(
        "{:<12} {:>10} {:>14} {:>9} {:>12} {:>9} {:>4}",
        "Date", "Adj Close", "Volume", "Return", "Amihud", "Z", "Anom"
    );
    println!("{}", "-".repeat(76));
    for r in shown {
        println!(
            "{:<12} {:>10.2} {:>14} {:>8.2}% {:>12.3e} {:>9.2} {:>4}",
            r.date().to_string(),
            r.bar.adj_close,
            r.bar.volume,
            r.ret * 100.0,
            r.illiquidity,
            r.z_score,
            if r.anomaly { "*" } else { "" }
        );
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_backtest(table: &FeatureTable, start: Option<&str>, end: Option<&str>) -> Result<()> {
    let Some((default_start, default_end)) = view::default_range(table) else {
        bail!("no rows for {}", table.ticker);
    };
    let start = start.map(parse_date).transpose()?.unwrap_or(default_start);
    let end = end.map(parse_date).transpose()?.unwrap_or(default_end);
    if start > end {
        bail!("--start {start} is after --end {end}");
    }

    let view = BacktestView::new(table, start, end);
    println!();
    println!("=== Liquidity Backtest ===");
    println!("Ticker:           {}", table.ticker);
    println!("Period:           {start} to {end}");
    println!("Rows:             {}", view.rows.len());
    println!("Total return:     {:.2}%", view.total_return() * 100.0);
    println!("Anomalies:        {}", view.anomaly_count());
    println!("Mean Amihud:      {:.3e}", view.mean_illiquidity());
    println!("Max Amihud:       {:.3e}", view.max_illiquidity());

    let anomalous: Vec<String> = view
        .rows
        .iter()
        .filter(|r| r.anomaly)
        .map(|r| r.date().to_string())
        .collect();
    if !anomalous.is_empty() {
        println!("Anomalous days:   {}", anomalous.join(", "));
    }
    Ok(())
}

fn run_export(table: &FeatureTable, output: Option<&Path>, format: ExportFormat) -> Result<()> {
    let body = match format {
        ExportFormat::Csv => export::table_to_csv(table)?,
        ExportFormat::Json => export::table_to_json(table)?,
    };
    match output {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} rows to {}", table.len(), path.display());
        }
        None => print!("{body}"),
    }
    Ok(())
}

// ── cache ────────────────────────────────────────────────────────────

fn run_cache_status(config: &LiqwatchConfig) -> Result<()> {
    let cache_dir = &config.cache.dir;
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetFeatureCache::new(cache_dir);
    let entries = cache.entries()?;
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let mut total_size = 0u64;
    println!("Cache: {}", cache_dir.display());
    println!("Tickers: {}", entries.len());
    println!();
    println!(
        "{:<8} {:<25} {:>6} {:>6} {:<20} {:>10}",
        "Ticker", "Date Range", "Rows", "Anom", "Cached At", "Size"
    );
    println!("{}", "-".repeat(80));
    for meta in &entries {
        let range = match (meta.start_date, meta.end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => "(empty)".to_string(),
        };
        let size = dir_size(&cache_dir.join(format!("ticker={}", meta.ticker)));
        total_size += size;
        println!(
            "{:<8} {:<25} {:>6} {:>6} {:<20} {:>10}",
            meta.ticker,
            range,
            meta.row_count,
            meta.anomaly_count,
            meta.cached_at.format("%Y-%m-%d %H:%M"),
            format_size(size)
        );
    }
    println!();
    println!("Total size: {}", format_size(total_size));

    let missing: Vec<&str> = config
        .universe
        .iter()
        .filter(|t| !entries.iter().any(|m| &m.ticker == *t))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        println!("Not cached (universe): {}", missing.join(" "));
    }
    Ok(())
}

fn run_cache_invalidate(config: &LiqwatchConfig, tickers: &[String]) -> Result<()> {
    let cache = ParquetFeatureCache::new(&config.cache.dir);
    for ticker in tickers {
        let ticker = liqwatch_core::pipeline::normalize_ticker(ticker)?;
        cache.invalidate(&ticker)?;
        println!("Invalidated: {ticker}");
    }
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                size += meta.len();
            }
        }
    }
    size
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

// ── config ───────────────────────────────────────────────────────────

fn run_config_init(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
    if path.exists() && !force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, LiqwatchConfig::default().to_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    if let Some(user_path) = default_config_path() {
        println!("(user-wide config location: {})", user_path.display());
    }
    Ok(())
}

fn run_config_show(config: &LiqwatchConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

//! LiqWatch TUI: two-tab liquidity dashboard over the feature pipeline.
//!
//! Tabs:
//! 1. Liquidity Overview: Amihud ratio with anomaly markers, daily volume
//! 2. Liquidity Backtest: adjustable date range, cumulative return, summary
//!
//! Every request goes synchronously through `LiquidityPipeline`, so a cache
//! miss blocks the UI until the ticker is computed.

mod app;
mod input;
mod theme;
mod ui;

use std::fs::{self, File};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

use liqwatch_core::{LiqwatchConfig, LiquidityPipeline, PipelineError};

use crate::app::{Action, AppState};

const LOG_FILE: &str = "liqwatch-tui.log";

#[derive(Parser, Debug)]
#[command(name = "liqwatch-tui", version, about = "Liquidity anomaly dashboard")]
struct Args {
    /// Config file (default: ./liqwatch.toml, then the user config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the feature cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = LiqwatchConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.cache_dir {
        config.cache.dir = dir;
    }

    init_file_logging(&config)?;
    let pipeline = LiquidityPipeline::from_config(&config)?;
    tracing::info!(
        tickers = pipeline.universe().len(),
        source = pipeline.source_name(),
        "dashboard starting"
    );

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    let mut app = AppState::new(pipeline.universe().to_vec());

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app, &pipeline);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = pipeline.close() {
        tracing::warn!(error = %e, "cache close failed");
    }
    result
}

/// Logs go to `{cache.dir}/liqwatch-tui.log`; stderr would tear the alternate screen.
fn init_file_logging(config: &LiqwatchConfig) -> Result<()> {
    fs::create_dir_all(&config.cache.dir)
        .with_context(|| format!("failed to create {}", config.cache.dir.display()))?;
    let path = config.cache.dir.join(LOG_FILE);
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    pipeline: &LiquidityPipeline,
) -> Result<()> {
    if let Some(action) = app.load_selected() {
        terminal.draw(|f| ui::draw(f, app))?;
        execute_action(app, pipeline, action);
    }

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // 50ms tick
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = input::handle_key(app, key) {
                    execute_action(app, pipeline, action);
                }
            }
        }

        if !app.running {
            break;
        }
    }
    Ok(())
}

/// Run pipeline work and report the outcome in the status bar.
fn execute_action(app: &mut AppState, pipeline: &LiquidityPipeline, action: Action) {
    let result = match &action {
        Action::Load(ticker) => pipeline.get_or_compute(ticker),
        Action::Refresh(ticker) => pipeline
            .force_refresh(ticker)
            .and_then(|()| pipeline.get_or_compute(ticker)),
    };

    match result {
        Ok(table) => {
            app.set_table(table);
            if matches!(action, Action::Refresh(_)) {
                if let Some((msg, _)) = app.status_message.take() {
                    app.set_status(format!("Refreshed {msg}"));
                }
            }
        }
        Err(e) => {
            tracing::warn!(action = ?action, error = %e, "dashboard request failed");
            app.clear_table();
            report_error(app, &e);
        }
    }
}

fn report_error(app: &mut AppState, e: &PipelineError) {
    if e.is_recoverable() {
        app.set_warning(format!("{e} (press r to retry)"));
    } else {
        app.set_error(e.to_string());
    }
}

//! Dashboard state: selected ticker, loaded table, active tab, backtest range.
//!
//! The state never talks to the pipeline itself. Key handling returns an
//! [`Action`] and the event loop in `main` runs it and feeds the result back.

use liqwatch_core::view::{BacktestView, DEFAULT_BACKTEST_ROWS};
use liqwatch_core::FeatureTable;

/// Dashboard tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Backtest,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Overview, Tab::Backtest];

    pub fn index(self) -> usize {
        match self {
            Tab::Overview => 0,
            Tab::Backtest => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Overview => "Liquidity Overview",
            Tab::Backtest => "Liquidity Backtest",
        }
    }

    pub fn next(self) -> Tab {
        match self {
            Tab::Overview => Tab::Backtest,
            Tab::Backtest => Tab::Overview,
        }
    }
}

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Work for the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read-through load of a ticker.
    Load(String),
    /// Drop the cached entry and recompute.
    Refresh(String),
}

/// Inclusive row-index range into the loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    /// Last [`DEFAULT_BACKTEST_ROWS`] rows of a table with `len` rows.
    pub fn latest(len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        Some(Self {
            start: len.saturating_sub(DEFAULT_BACKTEST_ROWS),
            end: len - 1,
        })
    }
}

pub struct AppState {
    pub running: bool,
    pub tab: Tab,
    pub tickers: Vec<String>,
    pub selected: usize,
    pub table: Option<FeatureTable>,
    pub range: Option<RowRange>,
    pub status_message: Option<(String, StatusLevel)>,
}

impl AppState {
    pub fn new(tickers: Vec<String>) -> Self {
        Self {
            running: true,
            tab: Tab::Overview,
            tickers,
            selected: 0,
            table: None,
            range: None,
            status_message: None,
        }
    }

    pub fn selected_ticker(&self) -> Option<&str> {
        self.tickers.get(self.selected).map(String::as_str)
    }

    /// Load action for the current selection.
    pub fn load_selected(&self) -> Option<Action> {
        self.selected_ticker().map(|t| Action::Load(t.to_string()))
    }

    pub fn refresh_selected(&self) -> Option<Action> {
        self.selected_ticker().map(|t| Action::Refresh(t.to_string()))
    }

    pub fn select_next(&mut self) -> Option<Action> {
        if self.tickers.is_empty() {
            return None;
        }
        self.selected = (self.selected + 1) % self.tickers.len();
        self.load_selected()
    }

    pub fn select_prev(&mut self) -> Option<Action> {
        if self.tickers.is_empty() {
            return None;
        }
        self.selected = (self.selected + self.tickers.len() - 1) % self.tickers.len();
        self.load_selected()
    }

    /// Show a freshly loaded table and reset the backtest range.
    pub fn set_table(&mut self, table: FeatureTable) {
        self.range = RowRange::latest(table.len());
        self.set_status(format!(
            "{}: {} rows, {} anomalies",
            table.ticker,
            table.len(),
            table.anomaly_count()
        ));
        self.table = Some(table);
    }

    /// Drop the displayed table (e.g. after a failed load).
    pub fn clear_table(&mut self) {
        self.table = None;
        self.range = None;
    }

    /// Move the range start by `delta` rows, keeping `start <= end`.
    pub fn shift_start(&mut self, delta: isize) {
        if let Some(range) = self.range.as_mut() {
            range.start = range.start.saturating_add_signed(delta).min(range.end);
        }
    }

    /// Move the range end by `delta` rows, keeping `start <= end < len`.
    pub fn shift_end(&mut self, delta: isize) {
        let Some(len) = self.table.as_ref().map(FeatureTable::len) else {
            return;
        };
        if let Some(range) = self.range.as_mut() {
            range.end = range
                .end
                .saturating_add_signed(delta)
                .clamp(range.start, len.saturating_sub(1));
        }
    }

    pub fn backtest_view(&self) -> Option<BacktestView<'_>> {
        let table = self.table.as_ref()?;
        let range = self.range?;
        let start = table.rows.get(range.start)?.date();
        let end = table.rows.get(range.end)?.date();
        Some(BacktestView::new(table, start, end))
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use liqwatch_core::{Bar, FeatureRow};

    fn table(n: usize) -> FeatureTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..n)
            .map(|i| FeatureRow {
                bar: Bar {
                    date: start + Duration::days(i as i64),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    adj_close: 1.0,
                    volume: 10,
                },
                ret: 0.001,
                illiquidity: 1e-4,
                z_score: 0.0,
                anomaly: false,
            })
            .collect();
        FeatureTable::new("T", rows)
    }

    fn app() -> AppState {
        AppState::new(vec!["AAPL".into(), "MSFT".into(), "TSLA".into()])
    }

    #[test]
    fn ticker_selection_wraps() {
        let mut app = app();
        assert_eq!(app.select_prev(), Some(Action::Load("TSLA".into())));
        assert_eq!(app.select_next(), Some(Action::Load("AAPL".into())));
        assert_eq!(app.select_next(), Some(Action::Load("MSFT".into())));
        assert_eq!(app.refresh_selected(), Some(Action::Refresh("MSFT".into())));
    }

    #[test]
    fn empty_universe_has_no_actions() {
        let mut app = AppState::new(Vec::new());
        assert_eq!(app.select_next(), None);
        assert_eq!(app.load_selected(), None);
    }

    #[test]
    fn tab_cycle() {
        assert_eq!(Tab::Overview.next(), Tab::Backtest);
        assert_eq!(Tab::Backtest.next(), Tab::Overview);
        for (i, tab) in Tab::ALL.iter().enumerate() {
            assert_eq!(tab.index(), i);
        }
    }

    #[test]
    fn set_table_defaults_to_last_sixty_rows() {
        let mut app = app();
        app.set_table(table(100));
        assert_eq!(app.range, Some(RowRange { start: 40, end: 99 }));
        assert_eq!(app.backtest_view().unwrap().rows.len(), 60);
        assert_eq!(app.status_message.as_ref().map(|m| m.1), Some(StatusLevel::Info));
    }

    #[test]
    fn short_table_uses_every_row() {
        let mut app = app();
        app.set_table(table(12));
        assert_eq!(app.range, Some(RowRange { start: 0, end: 11 }));
    }

    #[test]
    fn range_moves_are_clamped() {
        let mut app = app();
        app.set_table(table(100));

        app.shift_end(5);
        assert_eq!(app.range.unwrap().end, 99);

        app.shift_start(-100);
        assert_eq!(app.range.unwrap().start, 0);

        app.shift_end(-200);
        assert_eq!(app.range.unwrap().end, 0);

        app.shift_start(3);
        assert_eq!(app.range.unwrap().start, 0);

        app.shift_end(10);
        app.shift_start(4);
        assert_eq!(app.range, Some(RowRange { start: 4, end: 10 }));
        assert_eq!(app.backtest_view().unwrap().rows.len(), 7);
    }

    #[test]
    fn cleared_table_has_no_view() {
        let mut app = app();
        app.set_table(table(30));
        app.clear_table();
        assert!(app.backtest_view().is_none());
        app.shift_start(1);
        assert!(app.range.is_none());
    }
}

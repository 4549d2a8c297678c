//! Top-level layout: tab header, active tab, 1-line status bar.

pub mod backtest;
pub mod overview;
pub mod status_bar;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use ratatui::Frame;

use crate::app::{AppState, Tab};
use crate::theme;

pub fn draw(f: &mut Frame, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, chunks[0], app);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border())
        .title(Span::styled(
            format!(" {} ", app.tab.label()),
            theme::bold(theme::ACCENT),
        ));
    let inner = block.inner(chunks[1]);
    f.render_widget(block, chunks[1]);

    match &app.table {
        Some(table) if !table.is_empty() => match app.tab {
            Tab::Overview => overview::render(f, inner, table),
            Tab::Backtest => backtest::render(f, inner, app),
        },
        _ => render_empty(f, inner, app),
    }

    status_bar::render(f, chunks[2], app);
}

fn draw_header(f: &mut Frame, area: Rect, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(24)])
        .split(area);

    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(format!("{}:{}", i + 1, t.label())))
        .collect();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme::panel_border())
                .title(Span::styled(" LiqWatch ", theme::bold(theme::ACCENT))),
        )
        .select(app.tab.index())
        .style(theme::muted())
        .highlight_style(theme::bold(theme::ACCENT));
    f.render_widget(tabs, chunks[0]);

    let ticker = app.selected_ticker().unwrap_or("-");
    let position = if app.tickers.is_empty() {
        String::new()
    } else {
        format!(" ({}/{})", app.selected + 1, app.tickers.len())
    };
    let selector = Paragraph::new(Line::from(vec![
        Span::styled("◀ ", theme::muted()),
        Span::styled(ticker.to_string(), theme::bold(theme::TEXT)),
        Span::styled(position, theme::muted()),
        Span::styled(" ▶", theme::muted()),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme::panel_border())
            .title(Span::styled(" Ticker ", theme::muted())),
    );
    f.render_widget(selector, chunks[1]);
}

fn render_empty(f: &mut Frame, area: Rect, app: &AppState) {
    let msg = match app.selected_ticker() {
        Some(t) => format!("No data loaded for {t}. Press r to refresh."),
        None => "Universe is empty. Add tickers to liqwatch.toml.".to_string(),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(msg, theme::muted())),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

/// Index-based x bounds with date labels at both ends.
pub(crate) fn date_axis_labels<'a>(
    first: chrono::NaiveDate,
    last: chrono::NaiveDate,
) -> Vec<Span<'a>> {
    vec![
        Span::styled(first.to_string(), theme::muted()),
        Span::styled(last.to_string(), theme::muted()),
    ]
}

/// Min/max of `values` padded by 5%, never collapsed to a point.
pub(crate) fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let pad = (hi - lo).abs() * 0.05;
    if pad == 0.0 {
        let spread = if lo == 0.0 { 1.0 } else { lo.abs() * 0.05 };
        return [lo - spread, hi + spread];
    }
    [lo - pad, hi + pad]
}

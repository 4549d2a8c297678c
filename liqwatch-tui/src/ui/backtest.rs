//! Tab 2: date-range summary, cumulative return and Amihud ratio.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};
use ratatui::Frame;

use liqwatch_core::view::BacktestView;

use super::{date_axis_labels, padded_bounds};
use crate::app::AppState;
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let Some(view) = app.backtest_view() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Percentage(50),
            Constraint::Min(4),
        ])
        .split(area);

    render_summary(f, chunks[0], &view);
    if view.is_empty() {
        return;
    }

    let cumulative: Vec<(f64, f64)> = view
        .cumulative
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v * 100.0))
        .collect();
    let color = theme::pnl_color(view.total_return());
    render_series(
        f,
        chunks[1],
        &view,
        " Cumulative return (%) ",
        &cumulative,
        color,
        |v| format!("{v:.1}"),
    );

    let illiquidity: Vec<(f64, f64)> = view
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| (i as f64, r.illiquidity))
        .collect();
    render_series(
        f,
        chunks[2],
        &view,
        " Amihud illiquidity ",
        &illiquidity,
        theme::ACCENT,
        |v| format!("{v:.2e}"),
    );
}

fn render_summary(f: &mut Frame, area: Rect, view: &BacktestView<'_>) {
    let total = view.total_return();
    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{} → {}", view.start, view.end), theme::text()),
            Span::styled(format!("  {} days", view.rows.len()), theme::muted()),
            Span::styled("  total return ", theme::muted()),
            Span::styled(
                format!("{:+.2}%", total * 100.0),
                theme::bold(theme::pnl_color(total)),
            ),
            Span::styled("  anomalies ", theme::muted()),
            Span::styled(
                view.anomaly_count().to_string(),
                if view.anomaly_count() > 0 {
                    theme::bold(theme::NEGATIVE)
                } else {
                    theme::text()
                },
            ),
            Span::styled(
                format!(
                    "  mean ILLIQ {:.2e}  max {:.2e}",
                    view.mean_illiquidity(),
                    view.max_illiquidity()
                ),
                theme::muted(),
            ),
        ]),
        Line::from(Span::styled(
            "h/l move start, H/L move end, j/k jump start by 20",
            theme::muted(),
        )),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

fn render_series(
    f: &mut Frame,
    area: Rect,
    view: &BacktestView<'_>,
    title: &str,
    data: &[(f64, f64)],
    color: ratatui::style::Color,
    fmt: impl Fn(f64) -> String,
) {
    let y = padded_bounds(data.iter().map(|p| p.1));
    let x_max = data.len().saturating_sub(1).max(1) as f64;

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(data);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(theme::panel_border())
                .title(Span::styled(title.to_string(), theme::text())),
        )
        .x_axis(
            Axis::default()
                .style(theme::muted())
                .bounds([0.0, x_max])
                .labels(date_axis_labels(view.start, view.end)),
        )
        .y_axis(
            Axis::default()
                .style(theme::muted())
                .bounds(y)
                .labels(vec![
                    Span::styled(fmt(y[0]), theme::muted()),
                    Span::styled(fmt(y[1]), theme::muted()),
                ]),
        );

    f.render_widget(chart, area);
}

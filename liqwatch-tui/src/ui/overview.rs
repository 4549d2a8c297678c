//! Tab 1: Amihud ratio with anomaly markers, daily volume below.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::Span;
use ratatui::widgets::{Axis, BarChart, Block, Borders, Chart, Dataset, GraphType};
use ratatui::Frame;

use liqwatch_core::FeatureTable;

use super::{date_axis_labels, padded_bounds};
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, table: &FeatureTable) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_illiquidity(f, chunks[0], table);
    render_volume(f, chunks[1], table);
}

fn render_illiquidity(f: &mut Frame, area: Rect, table: &FeatureTable) {
    let line: Vec<(f64, f64)> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| (i as f64, r.illiquidity))
        .collect();
    let flagged: Vec<(f64, f64)> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.anomaly)
        .map(|(i, r)| (i as f64, r.illiquidity))
        .collect();

    let y = padded_bounds(table.rows.iter().map(|r| r.illiquidity));
    let x_max = table.len().saturating_sub(1).max(1) as f64;

    let datasets = vec![
        Dataset::default()
            .name("Amihud")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::ACCENT))
            .data(&line),
        Dataset::default()
            .name(format!("Anomaly ({})", flagged.len()))
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(theme::bold(theme::NEGATIVE))
            .data(&flagged),
    ];

    let (first, last) = match (table.first_date(), table.last_date()) {
        (Some(a), Some(b)) => (a, b),
        _ => return,
    };

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(theme::panel_border())
                .title(Span::styled(
                    format!(" {} Amihud illiquidity ", table.ticker),
                    theme::text(),
                )),
        )
        .x_axis(
            Axis::default()
                .style(theme::muted())
                .bounds([0.0, x_max])
                .labels(date_axis_labels(first, last)),
        )
        .y_axis(
            Axis::default()
                .style(theme::muted())
                .bounds(y)
                .labels(vec![
                    Span::styled(format!("{:.2e}", y[0]), theme::muted()),
                    Span::styled(format!("{:.2e}", y[1]), theme::muted()),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_volume(f: &mut Frame, area: Rect, table: &FeatureTable) {
    // Span the whole table like the Amihud chart above it.
    let width = (area.width as usize).max(1);
    let volumes: Vec<u64> = table.rows.iter().map(|r| r.bar.volume).collect();
    let buckets = bucket_volumes(&volumes, width);
    let bar_width = (width / buckets.len().max(1)).clamp(1, u16::MAX as usize) as u16;
    let data: Vec<(&str, u64)> = buckets.iter().map(|&v| ("", v)).collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::NONE)
                .title(Span::styled(" Volume ", theme::text())),
        )
        .data(data.as_slice())
        .bar_width(bar_width)
        .bar_gap(0)
        .bar_style(theme::neutral())
        .value_style(theme::neutral());

    f.render_widget(chart, area);
}

/// Average consecutive volumes into at most `width` buckets, oldest first.
fn bucket_volumes(volumes: &[u64], width: usize) -> Vec<u64> {
    if volumes.len() <= width {
        return volumes.to_vec();
    }
    let per_bucket = volumes.len().div_ceil(width.max(1));
    volumes
        .chunks(per_bucket)
        .map(|chunk| chunk.iter().sum::<u64>() / chunk.len() as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_series_keeps_every_day() {
        assert_eq!(bucket_volumes(&[5, 7, 9], 10), vec![5, 7, 9]);
        assert!(bucket_volumes(&[], 10).is_empty());
    }

    #[test]
    fn long_series_is_averaged_across_the_full_range() {
        let volumes: Vec<u64> = (1..=10).collect();
        assert_eq!(bucket_volumes(&volumes, 4), vec![2, 5, 8, 10]);

        // The oldest day still lands in the first bucket.
        let mut volumes = vec![1_000; 250];
        volumes[0] = 0;
        let buckets = bucket_volumes(&volumes, 50);
        assert_eq!(buckets.len(), 50);
        assert_eq!(buckets[0], 800);
        assert_eq!(buckets[49], 1_000);
    }
}

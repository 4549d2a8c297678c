//! Neon-on-charcoal palette and the styles built from it.

use ratatui::style::{Color, Modifier, Style};

pub const BACKGROUND: Color = Color::Rgb(18, 18, 20);
/// Electric cyan: focus, primary series.
pub const ACCENT: Color = Color::Rgb(0, 255, 255);
/// Neon green: gains.
pub const POSITIVE: Color = Color::Rgb(0, 255, 128);
/// Hot pink: losses, anomalies, errors.
pub const NEGATIVE: Color = Color::Rgb(255, 20, 147);
pub const WARNING: Color = Color::Rgb(255, 140, 0);
/// Cool purple: secondary series.
pub const NEUTRAL: Color = Color::Rgb(147, 112, 219);
pub const MUTED: Color = Color::Rgb(100, 149, 237);
pub const TEXT: Color = Color::White;

pub fn accent() -> Style {
    Style::default().fg(ACCENT)
}

pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

pub fn warning() -> Style {
    Style::default().fg(WARNING)
}

pub fn negative() -> Style {
    Style::default().fg(NEGATIVE)
}

pub fn neutral() -> Style {
    Style::default().fg(NEUTRAL)
}

pub fn text() -> Style {
    Style::default().fg(TEXT)
}

pub fn bold(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

pub fn panel_border() -> Style {
    Style::default().fg(MUTED).bg(BACKGROUND)
}

/// Green for gains, pink for losses.
pub fn pnl_color(value: f64) -> Color {
    if value >= 0.0 {
        POSITIVE
    } else {
        NEGATIVE
    }
}

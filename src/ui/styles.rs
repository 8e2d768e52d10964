//! Color scheme and styling for the TUI dashboard.

use ratatui::prelude::*;

pub const HEADER_BG: Color = Color::Rgb(30, 30, 46);
pub const HEADER_FG: Color = Color::Rgb(180, 190, 254);

pub const TABLE_HEADER_FG: Color = Color::Rgb(137, 180, 250);

pub const SELECTED_BG: Color = Color::Rgb(137, 180, 250);
pub const SELECTED_FG: Color = Color::Black;

pub const SUCCESS_COLOR: Color = Color::Rgb(166, 227, 161);
pub const ERROR_COLOR: Color = Color::Rgb(243, 139, 168);
pub const WARNING_COLOR: Color = Color::Rgb(249, 226, 175);

pub const BORDER_COLOR: Color = Color::Rgb(69, 71, 90);
pub const TEXT_COLOR: Color = Color::Rgb(205, 214, 244);
pub const MUTED_COLOR: Color = Color::Rgb(127, 132, 156);

pub fn header_style() -> Style {
    Style::default()
        .bg(HEADER_BG)
        .fg(HEADER_FG)
        .add_modifier(Modifier::BOLD)
}

pub fn table_header_style() -> Style {
    Style::default()
        .fg(TABLE_HEADER_FG)
        .add_modifier(Modifier::BOLD)
}

pub fn selected_row_style() -> Style {
    Style::default()
        .bg(SELECTED_BG)
        .fg(SELECTED_FG)
        .add_modifier(Modifier::BOLD)
}

pub fn border_style() -> Style {
    Style::default().fg(BORDER_COLOR)
}

pub fn text_style() -> Style {
    Style::default().fg(TEXT_COLOR)
}

pub fn title_style() -> Style {
    text_style().add_modifier(Modifier::BOLD)
}

pub fn success_style() -> Style {
    Style::default()
        .fg(SUCCESS_COLOR)
        .add_modifier(Modifier::BOLD)
}

pub fn error_style() -> Style {
    Style::default()
        .fg(ERROR_COLOR)
        .add_modifier(Modifier::BOLD)
}

pub fn highlight_style() -> Style {
    Style::default()
        .fg(WARNING_COLOR)
        .add_modifier(Modifier::BOLD)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED_COLOR)
}

/// Style for a node's activity flag: active, down, or not yet probed.
pub fn status_style(is_active: Option<bool>) -> Style {
    match is_active {
        Some(true) => success_style(),
        Some(false) => error_style(),
        None => muted_style(),
    }
}

/// Green under 200ms, yellow under 500ms, red above.
pub fn latency_style(ms: f64) -> Style {
    if ms < 200.0 {
        success_style()
    } else if ms < 500.0 {
        highlight_style()
    } else {
        error_style()
    }
}

/// Style for how many blocks a node trails the best known height.
pub fn lag_style(lag: u64) -> Style {
    match lag {
        0 => success_style(),
        1..=2 => highlight_style(),
        _ => error_style(),
    }
}

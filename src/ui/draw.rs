//! UI rendering functions for the TUI dashboard.

use std::time::SystemTime;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use super::styles::*;
use crate::app::App;

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let size = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(0),
            Constraint::Length(7),
        ])
        .split(size);

    let body_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(main_layout[2]);

    draw_header(frame, main_layout[0], app);
    draw_session_stats(frame, main_layout[1], app);
    draw_nodes_table(frame, body_layout[0], app);
    draw_detail_panel(frame, body_layout[1], app);
    draw_keybinds(frame, main_layout[3]);
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .title_style(title_style())
        .borders(Borders::ALL)
        .border_style(border_style())
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let title = format!(" Neo Node Pool :: {} Health Dashboard ", app.network);
    let block = Block::default()
        .title(title)
        .title_style(header_style())
        .borders(Borders::ALL)
        .border_style(border_style());

    frame.render_widget(block, area);
}

fn format_uptime(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn draw_session_stats(frame: &mut Frame, area: Rect, app: &App) {
    let uptime_str = format_uptime(app.session_uptime().as_secs());

    let success_rate = app.success_rate();
    let calls_per_sec = app.calls_per_second();
    let avg_latency = app.average_latency();

    let success_bar_width: usize = 15;
    let success_filled = ((success_rate / 100.0) * success_bar_width as f64) as usize;
    let success_bar = format!(
        "[{}{}]",
        "█".repeat(success_filled),
        "░".repeat(success_bar_width.saturating_sub(success_filled))
    );

    let best_height = app
        .best_height()
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".into());

    let text = vec![
        Line::from(vec![
            Span::raw("Session: ").style(muted_style()),
            Span::raw(format!("Uptime: {} ", uptime_str)).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Calls: {} ", app.total_calls)).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Success: {} ", app.total_successes)).style(success_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Errors: {} ", app.total_errors)).style(if app.total_errors > 0 {
                error_style()
            } else {
                text_style()
            }),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Completions: {}", app.completions_seen)).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Network: ").style(muted_style()),
            Span::raw(format!("{}/{} active ", app.active_count(), app.nodes.len()))
                .style(highlight_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Best height: {} ", best_height)).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("{:.1} calls/s ", calls_per_sec)).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Avg Latency: {:.0}ms ", avg_latency)).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(success_bar).style(if success_rate > 95.0 {
                success_style()
            } else if success_rate > 80.0 {
                highlight_style()
            } else {
                error_style()
            }),
            Span::raw(format!(" {:.1}%", success_rate)).style(text_style()),
        ]),
    ];

    let paragraph = Paragraph::new(text).block(panel(" Session Analytics "));

    frame.render_widget(paragraph, area);
}

fn draw_nodes_table(frame: &mut Frame, area: Rect, app: &App) {
    let header_cells = [
        "", "Endpoint", "Status", "Latency", "Height", "Pending", "Trend", "User Agent",
    ]
    .into_iter()
    .map(|h| Cell::from(h).style(table_header_style()));

    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let best_height = app.best_height();
    let current_idx = app.current_idx();

    let rows = app.nodes.iter().enumerate().map(|(idx, meta)| {
        let marker = if idx == current_idx { "▶" } else { " " };

        let status = match meta.is_active {
            Some(true) => "active",
            Some(false) => "down",
            None => "unknown",
        };

        let (latency_str, latency_cell_style) = match meta.latency_ms {
            Some(ms) => (format!("{} ms", ms), latency_style(ms as f64)),
            None => ("-".to_string(), muted_style()),
        };

        let (height_str, height_style) = match (meta.block_height, best_height) {
            (Some(h), Some(best)) if best > h => {
                (format!("{} (-{})", h, best - h), lag_style(best - h))
            }
            (Some(h), _) => (h.to_string(), lag_style(0)),
            (None, _) => ("-".to_string(), muted_style()),
        };

        let history = app
            .latency_history
            .get(&meta.endpoint)
            .cloned()
            .unwrap_or_default();
        let sparkline_data: Vec<u64> = history.iter().copied().collect();
        let sparkline_str = create_mini_sparkline(&sparkline_data);

        let pending_style = if meta.pending_requests > 0 {
            highlight_style()
        } else {
            Style::default()
        };

        let cells = vec![
            Cell::from(marker).style(success_style()),
            Cell::from(meta.endpoint.clone()),
            Cell::from(status).style(status_style(meta.is_active)),
            Cell::from(latency_str).style(latency_cell_style),
            Cell::from(height_str).style(height_style),
            Cell::from(meta.pending_requests.to_string()).style(pending_style),
            Cell::from(sparkline_str).style(muted_style()),
            Cell::from(meta.user_agent.clone().unwrap_or_else(|| "-".into())),
        ];

        let mut row = Row::new(cells).height(1);
        if idx == app.selected_idx {
            row = row.style(selected_row_style());
        }
        row
    });

    let title = format!(" Nodes (policy: {}) ", app.policy);

    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Min(28),
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Length(14),
            Constraint::Length(7),
            Constraint::Length(12),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(panel(&title))
    .column_spacing(1);

    frame.render_widget(table, area);
}

fn create_mini_sparkline(data: &[u64]) -> String {
    if data.is_empty() {
        return "───────────".to_string();
    }

    let chars = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max_val = data.iter().copied().max().unwrap_or(1);
    let min_val = data.iter().copied().min().unwrap_or(0);
    let range = max_val.saturating_sub(min_val).max(1);

    data.iter()
        .rev()
        .take(11)
        .rev()
        .map(|&val| {
            let normalized = ((val - min_val) as f64 / range as f64 * 7.0) as usize;
            chars[normalized.min(7)]
        })
        .collect()
}

fn draw_detail_panel(frame: &mut Frame, area: Rect, app: &App) {
    let constraints = if app.batch_mode {
        vec![
            Constraint::Length(8),
            Constraint::Min(0),
            Constraint::Length(4),
            Constraint::Length(6),
        ]
    } else {
        vec![
            Constraint::Length(8),
            Constraint::Min(0),
            Constraint::Length(6),
        ]
    };

    let detail_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    draw_config_section(frame, detail_layout[0], app);
    draw_last_call_section(frame, detail_layout[1], app);

    if app.batch_mode {
        draw_batch_progress(frame, detail_layout[2], app);
        draw_leaderboard_section(frame, detail_layout[3], app);
    } else {
        draw_leaderboard_section(frame, detail_layout[2], app);
    }
}

fn draw_config_section(frame: &mut Frame, area: Rect, app: &App) {
    let current = app.pool.current_node_url();

    let selected = app.selected_endpoint().unwrap_or("-").to_string();

    let sampler = if app.diagnostic_interval.is_zero() {
        "disabled".to_string()
    } else {
        format!("every {} ms", app.diagnostic_interval.as_millis())
    };

    let batch_status = if app.batch_mode {
        format!("ON ({}/{})", app.batch_current, app.batch_count)
    } else {
        format!("OFF (count: {})", app.batch_count)
    };

    let batch_style = if app.batch_mode {
        success_style()
    } else {
        muted_style()
    };

    let text = vec![
        Line::from(vec![
            Span::raw("Policy  : ").style(muted_style()),
            Span::raw(app.policy.to_string()).style(highlight_style()),
        ]),
        Line::from(vec![
            Span::raw("Current : ").style(muted_style()),
            Span::raw(current).style(success_style()),
        ]),
        Line::from(vec![
            Span::raw("Selected: ").style(muted_style()),
            Span::raw(selected).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Method  : ").style(muted_style()),
            Span::raw(app.method.as_str()).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Sampler : ").style(muted_style()),
            Span::raw(sampler).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Batch   : ").style(muted_style()),
            Span::raw(batch_status).style(batch_style),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(panel("   Configuration "))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn draw_last_call_section(frame: &mut Frame, area: Rect, app: &App) {
    let last_endpoint_str = app.last_endpoint.clone().unwrap_or_else(|| "-".into());

    let last_latency_str = app
        .last_latency_ms
        .map(|ms| format!("{:.1} ms", ms))
        .unwrap_or_else(|| "-".into());

    let latency_cell_style = app
        .last_latency_ms
        .map(latency_style)
        .unwrap_or_else(muted_style);

    let text = vec![
        Line::from(vec![
            Span::raw("Result  : ").style(muted_style()),
            Span::raw(&app.last_message).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Node    : ").style(muted_style()),
            Span::raw(last_endpoint_str).style(success_style()),
        ]),
        Line::from(vec![
            Span::raw("Latency : ").style(muted_style()),
            Span::raw(last_latency_str).style(latency_cell_style),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(panel("  Last Call "))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn draw_batch_progress(frame: &mut Frame, area: Rect, app: &App) {
    let progress = if app.batch_count > 0 {
        (app.batch_current as f64 / app.batch_count as f64 * 100.0) as u16
    } else {
        0
    };

    let label = format!("{}/{}", app.batch_current, app.batch_count);

    let gauge = Gauge::default()
        .block(panel("  Batch Progress "))
        .gauge_style(success_style())
        .percent(progress.min(100))
        .label(label);

    frame.render_widget(gauge, area);
}

fn seconds_ago(ts: Option<SystemTime>) -> String {
    ts.and_then(|t| t.elapsed().ok())
        .map(|d| format!("{}s ago", d.as_secs()))
        .unwrap_or_else(|| "never".into())
}

fn draw_leaderboard_section(frame: &mut Frame, area: Rect, app: &App) {
    let fastest = app.pool.get_fastest_node().meta();
    let highest = app.pool.get_highest_node().meta();

    let text = vec![
        Line::from(vec![
            Span::raw("Fastest : ").style(muted_style()),
            Span::raw(fastest.endpoint).style(success_style()),
            Span::raw(format!(
                "  {}",
                fastest
                    .latency_ms
                    .map(|ms| format!("{} ms", ms))
                    .unwrap_or_else(|| "-".into())
            ))
            .style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Highest : ").style(muted_style()),
            Span::raw(highest.endpoint).style(success_style()),
            Span::raw(format!(
                "  #{}",
                highest
                    .block_height
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "-".into())
            ))
            .style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Seen    : ").style(muted_style()),
            Span::raw(seconds_ago(highest.last_seen)).style(text_style()),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(panel("  Leaderboard "))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn draw_keybinds(frame: &mut Frame, area: Rect) {
    let keybinds = vec![
        Line::from(vec![
            Span::raw("  ").style(muted_style()),
            Span::raw("↑/↓").style(highlight_style()),
            Span::raw(" Select node     │  ").style(muted_style()),
            Span::raw("Space").style(highlight_style()),
            Span::raw(" Call selected  │  ").style(muted_style()),
            Span::raw("r").style(highlight_style()),
            Span::raw(" Call current   │  ").style(muted_style()),
            Span::raw("m").style(highlight_style()),
            Span::raw(" Toggle method").style(muted_style()),
        ]),
        Line::from(vec![
            Span::raw("  ").style(muted_style()),
            Span::raw("d").style(highlight_style()),
            Span::raw(" Default node    │  ").style(muted_style()),
            Span::raw("f").style(highlight_style()),
            Span::raw(" Fastest node   │  ").style(muted_style()),
            Span::raw("h").style(highlight_style()),
            Span::raw(" Highest node   │  ").style(muted_style()),
            Span::raw("b").style(highlight_style()),
            Span::raw(" Toggle batch").style(muted_style()),
        ]),
        Line::from(vec![
            Span::raw("  ").style(muted_style()),
            Span::raw(",/.").style(highlight_style()),
            Span::raw(" Batch count     │  ").style(muted_style()),
            Span::raw("s").style(highlight_style()),
            Span::raw(" Reset stats    │  ").style(muted_style()),
            Span::raw("q").style(highlight_style()),
            Span::raw(" Quit").style(muted_style()),
        ]),
    ];

    let paragraph = Paragraph::new(keybinds)
        .block(panel("  Keybinds "))
        .alignment(Alignment::Left);

    frame.render_widget(paragraph, area);
}

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};
use ratatui_macros::line;

use crate::app::{App, ConnectionState};

/// Shown in place of a BPM before the first reading arrives.
pub const NO_READING: &str = "--";

pub fn render_table(f: &mut Frame, area: Rect, app: &App) {
    let headers = vec![
        line!["Heart Rate"],
        line!["Device"],
        line!["Status"],
        line!["Window Low"],
        line!["Window High"],
    ];

    let bpm_string = app
        .window
        .current()
        .map(|sample| format!("{} BPM", sample.bpm()))
        .unwrap_or_else(|| NO_READING.into());

    let device_name = app
        .device
        .as_ref()
        .map(|d| d.name.as_str())
        .unwrap_or(NO_READING);

    let (status, status_style) = match app.connection_state {
        ConnectionState::Streaming => ("Streaming", Style::default().fg(Color::Green)),
        ConnectionState::Connected => ("Waiting for data", Style::default().fg(Color::Yellow)),
        ConnectionState::Connecting => ("Connecting", Style::default().fg(Color::Yellow)),
        ConnectionState::Disconnected => ("Disconnected", Style::default().fg(Color::Red)),
    };

    let (low, high) = match app.window.bpm_bounds() {
        Some((low, high)) => (low.to_string(), high.to_string()),
        None => (NO_READING.into(), NO_READING.into()),
    };

    let content = vec![
        Cell::from(bpm_string).style(Style::default().fg(Color::Red)),
        Cell::from(device_name.to_owned()),
        Cell::from(status).style(status_style),
        Cell::from(low),
        Cell::from(high),
    ];

    let constraints = [
        Constraint::Length(12),
        Constraint::Fill(1),
        Constraint::Length(18),
        Constraint::Length(12),
        Constraint::Length(12),
    ];

    let rows = vec![
        Row::new(headers).style(Style::default().add_modifier(Modifier::BOLD)),
        Row::new(content),
    ];

    let table = Table::new(rows, constraints).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Heart Rate Monitor")
            .border_style(Style::default().fg(Color::Yellow)),
    );

    f.render_widget(table, area);
}

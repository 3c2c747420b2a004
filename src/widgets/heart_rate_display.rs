use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::widgets::action_bar::action_bar;
use crate::widgets::heart_rate::{charts::render_bpm_chart, tables::render_table};

pub const INSIGHT_PLACEHOLDER: &str = "Press [a] to analyze the recent trend.";

/// Table of the latest values, the rolling chart, and the insight box.
pub fn heart_rate_display(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_table(f, chunks[0], app);
    render_bpm_chart(f, chunks[1], app);

    let insight_text = if app.insight_pending {
        "Analyzing...".to_string()
    } else {
        app.insight
            .clone()
            .unwrap_or_else(|| INSIGHT_PLACEHOLDER.into())
    };
    let insight = Paragraph::new(insight_text)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("AI Insight")
                .border_style(Style::default().fg(Color::Magenta)),
        );
    f.render_widget(insight, chunks[2]);

    let actions = action_bar(
        app.connection_state,
        true,
        app.insight_pending,
        app.frame_count,
    );
    f.render_widget(actions, chunks[3]);
}

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use ratatui_macros::span;

use crate::{
    app::{App, ErrorPopup},
    utils::centered_rect,
};

pub fn connecting_popup<'a>(device_name: &str, device_id: &str) -> Paragraph<'a> {
    Paragraph::new(format!(
        "Connecting to:\n{device_name}\n({device_id})\n\n[esc → cancel]"
    ))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    )
}

pub fn render_error_popup(app: &App, f: &mut Frame) {
    let Some(error_message) = app.error_message.as_ref() else {
        return;
    };
    let (style, title) = match error_message {
        ErrorPopup::Fatal(_) => (Style::default().fg(Color::Red), "!! Error !!"),
        ErrorPopup::Intermittent(_) => (Style::default().fg(Color::Yellow), "Warning"),
        ErrorPopup::UserMustDismiss(_) => {
            (Style::default().fg(Color::Blue), "!! Notification !!")
        }
    };

    let area = centered_rect(60, 50, f.area());

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_bottom(Line::from("[enter → dismiss]").alignment(Alignment::Center))
        .border_style(style);

    f.render_widget(Clear, area);
    f.render_widget(&block, area);

    let inner_area = block.inner(area);

    // First line is the summary, anything after it is error detail
    let mut lines = error_message.message().lines();
    let summary = lines.next().unwrap_or_default();
    let details: Vec<Line> = lines.map(Line::raw).collect();

    if details.is_empty() {
        let paragraph = Paragraph::new(span!(summary))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, inner_area);
    } else {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Fill(1), Constraint::Fill(3)])
            .split(inner_area);

        let first_paragraph = Paragraph::new(span!(summary))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        let second_paragraph = Paragraph::new(Text::from(details))
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: false });

        f.render_widget(first_paragraph, chunks[0]);
        f.render_widget(second_paragraph, chunks[1]);
    }
}

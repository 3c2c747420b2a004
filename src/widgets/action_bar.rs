use ratatui::{
    layout::Constraint,
    style::{Color, Style},
    widgets::{Row, Table},
};

use crate::app::ConnectionState;

pub const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Creates a table with the keys available in the current state
pub fn action_bar(
    state: ConnectionState,
    scan_paused: bool,
    insight_pending: bool,
    frame_count: usize,
) -> Table<'static> {
    let index_slow = (frame_count / 2) % SPINNER.len();
    let index = frame_count % SPINNER.len();
    let mut cells = vec!["[q → exit]".to_string()];
    match state {
        ConnectionState::Disconnected => {
            cells.push("[up/down → navigate]".into());
            cells.push("[enter → connect]".into());
            cells.push(if scan_paused {
                "[s → start scan]".into()
            } else {
                format!("[s → stop scan {}]", SPINNER[index_slow])
            });
        }
        ConnectionState::Connecting => {
            cells.push(format!("[esc → cancel {}]", SPINNER[index]));
        }
        ConnectionState::Connected | ConnectionState::Streaming => {
            cells.push("[d → disconnect]".into());
            cells.push(if insight_pending {
                format!("[a → analyzing... {}]", SPINNER[index])
            } else {
                "[a → get insight]".into()
            });
        }
    }
    let widths = [
        Constraint::Length(10),
        Constraint::Length(21),
        Constraint::Length(22),
        Constraint::Length(17),
    ];
    Table::new(
        vec![Row::new(cells).style(Style::default().fg(Color::DarkGray))],
        widths,
    )
    .column_spacing(1)
}

use ratatui::{
    layout::{Constraint, Direction, Layout},
    widgets::Clear,
    Frame,
};

use crate::app::{App, ConnectionState};
use crate::utils::centered_rect;
use crate::widgets::action_bar::action_bar;
use crate::widgets::device_table::device_table;
use crate::widgets::heart_rate_display::heart_rate_display;
use crate::widgets::prompts::{connecting_popup, render_error_popup};

use std::sync::atomic::Ordering;

/// Renders the user interface widgets.
pub fn render(app: &mut App, f: &mut Frame) {
    match app.connection_state {
        ConnectionState::Disconnected | ConnectionState::Connecting => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .vertical_margin(1)
                .constraints([Constraint::Min(3), Constraint::Length(1)])
                .split(f.area());

            let device_table = device_table(app.table_state.selected(), &app.discovered_devices);
            f.render_stateful_widget(device_table, chunks[0], &mut app.table_state);

            let action_bar = action_bar(
                app.connection_state,
                app.ble_scan_paused.load(Ordering::SeqCst),
                app.insight_pending,
                app.frame_count,
            );
            f.render_widget(action_bar, chunks[1]);
        }
        ConnectionState::Connected | ConnectionState::Streaming => {
            heart_rate_display(app, f);
        }
    }

    if let Some(device) = app.connecting_to.as_ref() {
        let area = centered_rect(50, 40, f.area());
        f.render_widget(Clear, area);
        f.render_widget(connecting_popup(&device.name, &device.id), area);
    }

    render_error_popup(app, f);
}

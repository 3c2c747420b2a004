use std::sync::atomic::Ordering;

use crate::app::App;
use crate::AppResult;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use tracing::debug;

/// Handles the key events and updates the state of [`App`].
pub fn handle_key_events(app: &mut App, key_event: KeyEvent) -> AppResult<()> {
    match key_event.code {
        KeyCode::Char('c') | KeyCode::Char('C')
            if key_event.modifiers == KeyModifiers::CONTROL =>
        {
            app.cancel_app.cancel();
        }
        KeyCode::Char('q') if app.error_message.is_none() => {
            app.cancel_app.cancel();
        }
        KeyCode::Char('s') if app.is_idle_on_main_menu() => {
            let current_state = app.ble_scan_paused.load(Ordering::SeqCst);
            app.ble_scan_paused.store(!current_state, Ordering::SeqCst);
            debug!("(S) Scan paused: {}", !current_state);
        }
        KeyCode::Char('a') if app.error_message.is_none() => {
            app.request_insight();
        }
        KeyCode::Char('d') if app.error_message.is_none() => {
            app.disconnect();
        }
        KeyCode::Enter => {
            app.enter_pressed();
        }
        KeyCode::Esc => {
            app.escape_pressed();
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.scroll_down();
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.scroll_up();
        }
        _ => {}
    }
    Ok(())
}

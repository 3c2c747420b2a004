use std::io;
use std::panic;

use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::Backend;
use ratatui::Terminal;

use crate::app::App;
use crate::event::EventHandler;
use crate::ui;
use crate::AppResult;

/// Representation of a terminal user interface.
///
/// Sets up the terminal and handles the drawing of the UI.
#[derive(Debug)]
pub struct Tui<B: Backend> {
    terminal: Terminal<B>,
    pub events: EventHandler,
}

impl<B: Backend> Tui<B> {
    pub fn new(terminal: Terminal<B>, events: EventHandler) -> Self {
        Self { terminal, events }
    }

    /// Enables raw mode and the alternate screen, restoring both if we panic.
    pub fn init(&mut self) -> AppResult<()> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;

        let panic_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic| {
            if let Err(e) = reset_terminal() {
                eprintln!("Failed to reset the terminal: {e}");
            }
            panic_hook(panic);
        }));

        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    pub fn draw(&mut self, app: &mut App) -> AppResult<()> {
        self.terminal.draw(|frame| ui::render(app, frame))?;
        Ok(())
    }

    pub fn autoresize(&mut self) -> AppResult<()> {
        self.terminal.autoresize()?;
        Ok(())
    }

    /// Restores the terminal.
    pub fn exit(&mut self) -> AppResult<()> {
        self.events.stop();
        reset_terminal()?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn reset_terminal() -> io::Result<()> {
    terminal::disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)
}

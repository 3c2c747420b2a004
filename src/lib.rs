#![deny(unused_must_use)]

use args::TopLevelCmd;
use errors::AppError;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{error, io, path::PathBuf};
use tokio::fs::create_dir_all;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use event::{Event, EventHandler};
use handler::handle_key_events;

use tui::Tui;

use tracing::{info, warn};

#[cfg(not(any(debug_assertions, feature = "portable")))]
use directories::BaseDirs;

pub mod args;
pub mod errors;
pub mod heart_rate;
pub mod insight;
pub mod settings;
pub mod structs;

mod app;
mod logging;
mod macros;
mod scan;
mod utils;
mod widgets;

mod event;
mod handler;
mod tui;
mod ui;

/// Application result type.
pub type AppResult<T> = std::result::Result<T, Box<dyn error::Error>>;

pub async fn run_tui(mut arg_config: TopLevelCmd) -> AppResult<()> {
    let working_directory = determine_working_directory().ok_or(AppError::WorkDir)?;
    // Resolve before moving into the working directory
    arg_config.config_override = arg_config
        .config_override
        .map(|p| std::path::absolute(&p))
        .transpose()?;
    if !working_directory.exists() {
        create_dir_all(&working_directory)
            .await
            .map_err(|e| AppError::CreateDir {
                path: working_directory.clone(),
                source: e,
            })?;
    }
    std::env::set_current_dir(&working_directory)?;
    let log_name = std::env::current_exe()?
        .with_extension("log")
        .file_name()
        .map(PathBuf::from)
        .ok_or(AppError::WorkDir)?;
    let _log_guard = logging::init_file_logging(&log_name)?;

    let mut app = App::build(&arg_config, None)?;

    // Initialize the terminal user interface.
    let backend = CrosstermBackend::new(io::stdout());
    let terminal = Terminal::new(backend)?;
    let events = EventHandler::new(100);
    let mut tui = Tui::new(terminal, events);
    tui.init()?;

    info!("Starting app... v{}", env!("CARGO_PKG_VERSION"));

    // Starting off at DEBUG, and setting to whatever user has defined
    logging::apply_level(app.settings.get_log_level());

    app.init().await;

    // Start the main loop.
    let result = loop {
        if app.cancel_app.is_cancelled() {
            break Ok(());
        }
        if let Err(e) = tui.draw(&mut app) {
            break Err(e);
        }
        tokio::select! {
            // Handle Crossterm events.
            val = tui.events.next() => {
                let handled = match val {
                    Ok(Event::Tick) => {
                        app.term_tick();
                        Ok(())
                    }
                    Ok(Event::Key(key_event)) => handle_key_events(&mut app, key_event),
                    Ok(Event::Resize) => tui.autoresize(),
                    Err(e) => Err(e),
                };
                if let Err(e) = handled {
                    break Err(e);
                }
            }
            // Handle BLE/session/insight updates
            data = app.app_receivers() => app.app_handlers(data)
        }
    };
    // After loop closes
    app.join_threads().await;

    info!("Shutting down gracefully...");

    // Reset the terminal.
    tui.exit()?;
    result
}

/// Runs without a terminal UI until `parent_token` is cancelled or the session ends.
///
/// Connection failures that the TUI would show as a popup are returned instead.
pub async fn run_headless(
    arg_config: TopLevelCmd,
    parent_token: CancellationToken,
) -> Result<(), AppError> {
    let mut app = App::build(&arg_config, Some(parent_token))?;

    logging::apply_level(app.settings.get_log_level());
    info!("Loaded config from: {}", app.config_path.display());
    info!("Starting app... v{}", env!("CARGO_PKG_VERSION"));

    app.init().await;

    let cancel_app = app.cancel_app.clone();
    while !cancel_app.is_cancelled() {
        // Nobody to dismiss these
        if let Some(popup) = app.error_message.take() {
            warn!("{}", popup.message());
        }
        tokio::select! {
            _ = cancel_app.cancelled() => {}
            data = app.app_receivers() => app.app_handlers(data)
        }
    }
    info!("Joining...");
    app.join_threads().await;

    info!("Shutting down gracefully...");

    match app.take_fatal_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Stdout logging for headless runs.
pub fn init_headless_logging() {
    logging::init_stdout_logging();
}

/// Returns the directory that logs, config, and other files should be placed in by default.
// The rules for how it determines the directory is as follows:
// If the app is built with the portable feature, it will just return it's parent directory.
// If there is a config file present adjacent to the executable, the executable's parent path is returned.
// Otherwise, it will return the `directories` `config_dir` output.
//
// Debug builds are always portable. Release builds can optionally have the "portable" feature enabled.
fn determine_working_directory() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_parent = exe_path.parent()?.to_path_buf();
    let config_path = exe_path.with_extension("toml");

    if is_portable() || config_path.exists() {
        Some(exe_parent)
    } else {
        get_user_dir()
    }
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn is_portable() -> bool {
    true
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn is_portable() -> bool {
    false
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn get_user_dir() -> Option<PathBuf> {
    None
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn get_user_dir() -> Option<PathBuf> {
    let base_dirs = BaseDirs::new()?;
    let mut config_dir = base_dirs.config_dir().to_owned();
    config_dir.push(env!("CARGO_PKG_NAME"));
    Some(config_dir)
}

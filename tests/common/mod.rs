use heartbeat_monitor::args::{DummyCmd, SubCommands, TopLevelCmd};
use heartbeat_monitor::errors::AppError;
use heartbeat_monitor::run_headless;
use tokio_util::sync::CancellationToken;

// Runs the app on its own multi-threaded runtime, like the real binary,
// so the session and app loop don't compete for a single test thread.
#[allow(dead_code)]
pub fn headless_thread(
    arg_config: TopLevelCmd,
    parent_token: CancellationToken,
) -> Result<(), AppError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?
        .block_on(run_headless(arg_config, parent_token))
}

#[allow(dead_code)]
pub fn headless_config(config_path: &str) -> TopLevelCmd {
    TopLevelCmd {
        config_override: Some(config_path.into()),
        config_required: true,
        no_save: true,
        headless: true,
        subcommands: None,
    }
}

#[allow(dead_code)]
pub fn headless_dummy_config(config_path: &str) -> TopLevelCmd {
    TopLevelCmd {
        subcommands: Some(SubCommands::Dummy(DummyCmd {})),
        ..headless_config(config_path)
    }
}

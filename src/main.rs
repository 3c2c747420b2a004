use heartbeat_monitor::args::TopLevelCmd;
use heartbeat_monitor::{init_headless_logging, run_headless, run_tui, AppResult};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> AppResult<()> {
    let arg_config: TopLevelCmd = argh::from_env();

    if !arg_config.headless {
        return run_tui(arg_config).await;
    }

    init_headless_logging();
    let parent_token = CancellationToken::new();
    let ctrl_c_token = parent_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping");
        }
        ctrl_c_token.cancel();
    });

    if let Err(e) = run_headless(arg_config, parent_token).await {
        error!("{e}");
        return Err(e.into());
    }
    Ok(())
}

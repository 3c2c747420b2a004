mod common;

use std::thread;
use std::time::Duration;

use common::{headless_dummy_config, headless_thread};
use tokio_util::sync::CancellationToken;

use ntest::timeout;

#[test_log::test]
#[timeout(5000)]
fn session_end_stops_headless_app() {
    // The dummy drops its "link" after one full sweep, there's nothing to reconnect to
    let result = headless_thread(
        headless_dummy_config("tests/test_configs/dummy_disconnect.toml"),
        CancellationToken::new(),
    );
    assert!(result.is_ok(), "{result:?}");
}

#[test_log::test]
#[timeout(5000)]
fn cancel_token_stops_headless_app() {
    let parent_token = CancellationToken::new();
    let app_token = parent_token.clone();
    let app = thread::spawn(move || {
        headless_thread(
            headless_dummy_config("tests/test_configs/dummy_forever.toml"),
            app_token,
        )
    });
    thread::sleep(Duration::from_millis(500));
    assert!(!app.is_finished());
    parent_token.cancel();
    let result = app.join().unwrap();
    assert!(result.is_ok(), "{result:?}");
}

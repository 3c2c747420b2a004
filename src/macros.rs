/// Sends an update to the app, quietly dropping it if the app is already gone.
#[macro_export]
macro_rules! broadcast {
    ($tx:expr, $data:expr) => {
        if $tx.send($data.into()).is_err() {
            tracing::debug!("App update receiver closed, dropping message");
        }
    };
}

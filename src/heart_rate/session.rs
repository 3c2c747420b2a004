use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::measurement::parse_hrm;
use super::{MonitorEvent, SessionId};
use crate::structs::DeviceHandle;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Why a session's notification loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Requested,
    StreamClosed,
    NoPackets,
    /// The platform reported the link down
    LinkLost,
    ReceiverGone,
}

/// One connection to a heart rate source, from a successful connect until it drops.
///
/// The notification task owns the link. Both [`Session::disconnect`] and a link
/// lost on its own end up in the same teardown, which sends a single
/// [`MonitorEvent::Disconnected`]. Dropping the session also disconnects it.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    device: DeviceHandle,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Session {
    /// Starts the notification task.
    ///
    /// `notifications` yields raw Heart Rate Measurement payloads, `teardown` closes the link.
    pub(crate) fn spawn(
        device: DeviceHandle,
        notifications: BoxStream<'static, Vec<u8>>,
        teardown: BoxFuture<'static, ()>,
        no_packet_timeout: Duration,
        event_tx: Sender<MonitorEvent>,
        parent_token: &CancellationToken,
    ) -> Self {
        Self::spawn_watched(
            device,
            notifications,
            futures::future::pending().boxed(),
            teardown,
            no_packet_timeout,
            event_tx,
            parent_token,
        )
    }
    /// Like [`Session::spawn`], but also ends the session once `link_lost` resolves.
    pub(crate) fn spawn_watched(
        device: DeviceHandle,
        notifications: BoxStream<'static, Vec<u8>>,
        link_lost: BoxFuture<'static, ()>,
        teardown: BoxFuture<'static, ()>,
        no_packet_timeout: Duration,
        event_tx: Sender<MonitorEvent>,
        parent_token: &CancellationToken,
    ) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let cancel_token = parent_token.child_token();
        let task_token = cancel_token.clone();
        let name = device.name.clone();

        let task = tokio::spawn(async move {
            let reason =
                notification_loop(
                    id,
                    notifications,
                    link_lost,
                    no_packet_timeout,
                    &event_tx,
                    &task_token,
                )
                .await;
            info!("Session {id} ({name}) ending: {reason:?}");
            teardown.await;
            if event_tx
                .send(MonitorEvent::Disconnected { session: id })
                .await
                .is_err()
            {
                debug!("Session {id}: nobody left to hear about the disconnect");
            }
        });

        Self {
            id,
            device,
            cancel_token,
            task: Some(task),
        }
    }
    pub fn id(&self) -> SessionId {
        self.id
    }
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }
    /// Asks the session to close. Safe to call any number of times.
    pub fn disconnect(&self) {
        if !self.cancel_token.is_cancelled() {
            info!("Disconnecting from {}", self.device.name);
            self.cancel_token.cancel();
        }
    }
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
    /// Disconnects and waits for teardown to complete.
    pub async fn join(mut self) {
        self.disconnect();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Session {} task failed: {e}", self.id);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn notification_loop(
    id: SessionId,
    mut notifications: BoxStream<'static, Vec<u8>>,
    mut link_lost: BoxFuture<'static, ()>,
    no_packet_timeout: Duration,
    event_tx: &Sender<MonitorEvent>,
    cancel_token: &CancellationToken,
) -> EndReason {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                return EndReason::Requested;
            }
            _ = &mut link_lost => {
                return EndReason::LinkLost;
            }
            data = notifications.next() => {
                let Some(data) = data else {
                    return EndReason::StreamClosed;
                };
                match parse_hrm(&data) {
                    Ok(bpm) => {
                        if event_tx.send(MonitorEvent::Sample { session: id, bpm }).await.is_err() {
                            return EndReason::ReceiverGone;
                        }
                    }
                    // A bad packet only costs us that packet
                    Err(e) => warn!("Session {id}: dropping notification {data:02X?}: {e}"),
                }
            }
            _ = tokio::time::sleep(no_packet_timeout) => {
                warn!("Session {id}: no HR data received in {} seconds!", no_packet_timeout.as_secs());
                return EndReason::NoPackets;
            }
        }
    }
}

use super::session::Session;
use super::MonitorEvent;
use crate::errors::AppError;
use crate::scan::get_central;
use crate::settings::BLESettings;
use crate::structs::DeviceInfo;

use btleplug::api::{Central as _, CentralEvent, Peripheral as _};
use btleplug::platform::{Peripheral, PeripheralId};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
pub const HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// Connects to the peripheral and subscribes to its Heart Rate Measurement notifications.
///
/// Every decoded BPM value of the returned [`Session`] is sent over `event_tx`.
/// On failure the link is closed again before returning.
pub async fn connect(
    peripheral: &DeviceInfo,
    event_tx: Sender<MonitorEvent>,
    ble_settings: &BLESettings,
    parent_token: &CancellationToken,
) -> Result<Session, AppError> {
    let device = peripheral
        .device
        .clone()
        .ok_or_else(|| AppError::Connection("Device object missing".into()))?;

    info!(
        "Connecting to Heart Rate Monitor! Name: {:?} | Address: {:?}",
        peripheral.name, peripheral.address
    );

    // Listen before connecting so a drop during setup isn't missed
    let link_lost = watch_link(device.id()).await;

    let connect_timeout = Duration::from_secs(ble_settings.connect_timeout_secs);
    match timeout(connect_timeout, device.connect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("BLE Connection error: {}", e);
            return Err(AppError::Connection(format!("BLE Connection error: {e}")));
        }
        Err(_) => {
            error!("Connection timed out");
            return Err(AppError::Connection("Connection timed out".into()));
        }
    }

    let notifications = match subscribe(&device).await {
        Ok(notifications) => notifications,
        Err(e) => {
            error!("{e}");
            close_link(device).await;
            return Err(e);
        }
    };

    Ok(Session::spawn_watched(
        peripheral.handle(),
        notifications,
        link_lost,
        close_link(device).boxed(),
        Duration::from_secs(ble_settings.no_packet_timeout_secs),
        event_tx,
        parent_token,
    ))
}

async fn subscribe(
    device: &Peripheral,
) -> Result<futures::stream::BoxStream<'static, Vec<u8>>, AppError> {
    device.discover_services().await.map_err(|e| {
        AppError::Connection(format!("Couldn't read services from connected device: {e}"))
    })?;

    let characteristics = device.characteristics();
    debug!("Found {} characteristics", characteristics.len());

    let characteristic = characteristics
        .iter()
        .find(|c| {
            c.uuid == HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID
                && c.service_uuid == HEART_RATE_SERVICE_UUID
        })
        .ok_or_else(|| {
            AppError::Connection("Didn't find HR characteristic during notification setup!".into())
        })?;

    device
        .subscribe(characteristic)
        .await
        .map_err(|e| AppError::Connection(format!("Failed to subscribe to HR service! {e}")))?;

    let notification_stream = device.notifications().await.map_err(|e| {
        AppError::Connection(format!("Failed to get HR BLE notification stream: {e}"))
    })?;

    Ok(notification_stream
        .filter_map(|data| async move {
            (data.uuid == HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID).then_some(data.value)
        })
        .boxed())
}

/// Resolves when the adapter reports `id` disconnected.
///
/// Without an adapter event stream the session falls back to its no-packet timeout.
async fn watch_link(id: PeripheralId) -> BoxFuture<'static, ()> {
    let events = match get_central().await {
        Ok(central) => central.events().await.map_err(AppError::from),
        Err(e) => Err(e),
    };
    match events {
        Ok(mut events) => async move {
            while let Some(event) = events.next().await {
                if matches!(event, CentralEvent::DeviceDisconnected(ref lost) if *lost == id) {
                    info!("Adapter reported {id} disconnected");
                    return;
                }
            }
            // Adapter event stream closed, leave it to the packet timeout
            futures::future::pending::<()>().await
        }
        .boxed(),
        Err(e) => {
            warn!("Can't watch for disconnects, relying on packet timeout: {e}");
            futures::future::pending().boxed()
        }
    }
}

async fn close_link(device: Peripheral) {
    match device.is_connected().await {
        Ok(true) => {
            if let Err(e) = device.disconnect().await {
                warn!("Failed to disconnect cleanly: {e}");
            }
        }
        Ok(false) => debug!("Link already down"),
        Err(e) => warn!("Couldn't query connection state: {e}"),
    }
}

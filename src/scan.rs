use crate::app::{DeviceUpdate, ErrorPopup};
use crate::errors::AppError;
use crate::heart_rate::ble::HEART_RATE_SERVICE_UUID;
use crate::settings::BLESettings;
use crate::structs::DeviceInfo;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Only peripherals advertising the Heart Rate service are reported.
fn heart_rate_filter() -> ScanFilter {
    ScanFilter {
        services: vec![HEART_RATE_SERVICE_UUID],
    }
}

/// Returns the first Bluetooth adapter of the system.
pub async fn get_central() -> Result<Adapter, AppError> {
    let manager = Manager::new().await.map_err(|e| {
        error!("Failed to create manager: {}", e);
        AppError::UnsupportedPlatform(format!("Failed to create manager: {e}"))
    })?;
    let adapters = manager.adapters().await.map_err(|e| {
        error!("Failed to list adapters: {}", e);
        AppError::UnsupportedPlatform(format!("Failed to list adapters: {e}"))
    })?;
    adapters.into_iter().next().ok_or_else(|| {
        error!("No Bluetooth adapters found!");
        AppError::UnsupportedPlatform(
            "No Bluetooth adapters found! Make sure it's plugged in and enabled.".into(),
        )
    })
}

async fn heart_rate_device(central: &Adapter, id: &PeripheralId) -> Option<DeviceInfo> {
    let device = central.peripheral(id).await.ok()?;
    let properties = device.properties().await.ok().flatten()?;
    let info = DeviceInfo::from_peripheral(device, properties);
    info.advertises_heart_rate().then_some(info)
}

/// Scans until a Heart Rate peripheral matching the saved name/address shows up.
///
/// This is the headless stand-in for picking a device from the table.
pub async fn request_device(
    ble_settings: &BLESettings,
    cancel_token: &CancellationToken,
) -> Result<DeviceInfo, AppError> {
    let central = get_central().await?;
    let mut events = central.events().await?;
    central.start_scan(heart_rate_filter()).await?;
    info!("Scanning for Heart Rate Monitors...");

    let result = 'scan: {
        // Peripherals the adapter already knows about won't necessarily be "discovered" again
        for device in central.peripherals().await.unwrap_or_default() {
            if let Some(info) = heart_rate_device(&central, &device.id()).await {
                if ble_settings.matches(&info) {
                    break 'scan Ok(info);
                }
            }
        }

        let deadline = tokio::time::sleep(Duration::from_secs(ble_settings.scan_timeout_secs));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                Some(event) = events.next() => {
                    if let CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) = event {
                        if let Some(info) = heart_rate_device(&central, &id).await {
                            if ble_settings.matches(&info) {
                                break 'scan Ok(info);
                            }
                            debug!("Skipping {} ({}), doesn't match saved device", info.name, info.address);
                        }
                    }
                }
                _ = &mut deadline => {
                    warn!("No matching Heart Rate Monitor found in {} seconds", ble_settings.scan_timeout_secs);
                    break 'scan Err(AppError::DeviceNotFound);
                }
                _ = cancel_token.cancelled() => {
                    break 'scan Err(AppError::DeviceNotFound);
                }
            }
        }
    };

    if let Err(e) = central.stop_scan().await {
        warn!("Failed to stop scan: {e}");
    }
    if let Ok(info) = &result {
        info!("Found {} ({})", info.name, info.address);
    }
    result
}

/// Scans for Heart Rate devices and sends the information to the provided `mpsc::Sender`.
/// The scan can be paused by setting the `pause_signal` to `true`.
pub async fn bluetooth_event_thread(
    tx: mpsc::Sender<DeviceUpdate>,
    pause_signal: Arc<AtomicBool>,
    cancel_token: CancellationToken,
) {
    info!("Bluetooth CentralEvent thread started!");
    let central = match get_central().await {
        Ok(central) => central,
        Err(e) => {
            let _ = tx
                .send(DeviceUpdate::Error(ErrorPopup::Fatal(e.to_string())))
                .await;
            return;
        }
    };

    let mut events = match central.events().await {
        Ok(e) => e,
        Err(e) => {
            error!("BLE failure: {}", e);
            let _ = tx
                .send(DeviceUpdate::Error(ErrorPopup::Fatal(format!(
                    "BLE failure: {e}"
                ))))
                .await;
            return;
        }
    };

    if let Err(e) = central.start_scan(heart_rate_filter()).await {
        error!("Scanning failure: {}", e);
        let _ = tx
            .send(DeviceUpdate::Error(ErrorPopup::Fatal(format!(
                "Scanning failure: {e}"
            ))))
            .await;
        return;
    }
    debug!("Inital scanning started!");
    let mut scanning = true;
    let mut pause_check = tokio::time::interval(Duration::from_millis(250));

    loop {
        let paused = pause_signal.load(Ordering::SeqCst);
        if paused && scanning {
            info!("Pausing scan");
            if let Err(e) = central.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
            scanning = false;
        } else if !paused && !scanning {
            info!("Resuming scan");
            if let Err(e) = central.start_scan(heart_rate_filter()).await {
                error!("Failed to resume scanning: {}", e);
                let _ = tx
                    .send(DeviceUpdate::Error(ErrorPopup::UserMustDismiss(format!(
                        "Failed to resume scanning: {e}"
                    ))))
                    .await;
            } else {
                scanning = true;
            }
        }
        tokio::select! {
            Some(event) = events.next() => {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        if let Some(device) = heart_rate_device(&central, &id).await {
                            if tx.send(DeviceUpdate::DeviceInfo(device)).await.is_err() {
                                error!("Couldn't send device info update!");
                                break;
                            }
                        }
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        warn!("Device disconnected: {}", id);
                        if tx.send(DeviceUpdate::DisconnectedEvent(id.to_string())).await.is_err() {
                            error!("Couldn't send DisconnectedEvent!");
                            break;
                        }
                    }
                    CentralEvent::DeviceConnected(id) => {
                        info!("Device connected: {}", id);
                    }
                    _ => {}
                }
            }
            _ = pause_check.tick() => {}
            _ = cancel_token.cancelled() => {
                info!("Shutting down Bluetooth CentralEvent thread!");
                break;
            }
        }
    }
    if scanning {
        let _ = central.stop_scan().await;
    }
}

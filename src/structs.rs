use btleplug::api::{Peripheral as _, PeripheralProperties};
use btleplug::platform::Peripheral;
use uuid::Uuid;

use crate::heart_rate::ble::HEART_RATE_SERVICE_UUID;

pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Identifier/name pair of the peripheral a session is connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub id: String,
    pub name: String,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.into());
        Self {
            id: id.into(),
            name,
        }
    }
}

/// A peripheral seen while scanning.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub services: Vec<Uuid>,
    pub device: Option<Peripheral>,
}

impl DeviceInfo {
    pub fn new(
        id: String,
        local_name: Option<String>,
        address: String,
        rssi: Option<i16>,
        services: Vec<Uuid>,
        device: Option<Peripheral>,
    ) -> Self {
        let handle = DeviceHandle::new(id, local_name);
        Self {
            id: handle.id,
            name: handle.name,
            address,
            rssi,
            services,
            device,
        }
    }
    pub fn from_peripheral(device: Peripheral, properties: PeripheralProperties) -> Self {
        Self::new(
            device.id().to_string(),
            properties.local_name,
            properties.address.to_string(),
            properties.rssi,
            properties.services,
            Some(device),
        )
    }
    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
    pub fn advertises_heart_rate(&self) -> bool {
        self.services.contains(&HEART_RATE_SERVICE_UUID)
    }
    pub fn rssi_string(&self) -> String {
        self.rssi
            .map(|rssi| format!("{rssi} dBm"))
            .unwrap_or_else(|| "n/a".into())
    }
}

use std::time::SystemTime;

use serde::Serialize;

use crate::core::{metrics::Series, types::Percentage};

/// Battery level of one component of a device (case, left bud, ...)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceBattery {
    pub component: String,
    pub level: Percentage,
}

/// One paired Bluetooth device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BluetoothDevice {
    pub name: String,
    pub address: Option<String>,
    pub kind: Option<String>,
    pub connected: bool,
    pub batteries: Vec<DeviceBattery>,
}

/// One Bluetooth sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BluetoothReading {
    pub devices: Vec<BluetoothDevice>,
    pub captured_at: SystemTime,
}

impl BluetoothReading {
    pub fn connected(&self) -> impl Iterator<Item = &BluetoothDevice> {
        self.devices.iter().filter(|d| d.connected)
    }

    /// Lowest battery level across connected devices
    pub fn lowest_battery(&self) -> Option<Percentage> {
        self.connected()
            .flat_map(|d| d.batteries.iter().map(|b| b.level))
            .fold(None, |min: Option<Percentage>, level| match min {
                Some(m) if m <= level => Some(m),
                _ => Some(level),
            })
    }

    pub fn series(&self) -> Vec<Series> {
        let mut series = vec![("connected", self.connected().count() as f64)];
        if let Some(lowest) = self.lowest_battery() {
            series.push(("lowest_battery", lowest.as_f64()));
        }
        series
    }
}

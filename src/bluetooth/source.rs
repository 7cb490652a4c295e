use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tracing::debug;

use super::BluetoothReading;
use crate::{
    core::metrics::{MetricFamily, MetricReading},
    error::Result,
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Bluetooth device inventory source
#[derive(Debug)]
pub struct BluetoothSource {
    probe: Arc<dyn SystemProbe>,
}

impl BluetoothSource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl MetricSource for BluetoothSource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Bluetooth
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let devices = run_blocking(&self.probe, |probe| probe.bluetooth_devices()).await?;
        let reading = BluetoothReading { devices, captured_at: SystemTime::now() };
        debug!(paired = reading.devices.len(), connected = reading.connected().count(), "Sampled bluetooth");
        Ok(MetricReading::Bluetooth(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bluetooth::{BluetoothDevice, DeviceBattery},
        core::types::Percentage,
        platform::MockSystemProbe,
    };

    fn device(name: &str, connected: bool, levels: &[f64]) -> BluetoothDevice {
        BluetoothDevice {
            name: name.into(),
            address: None,
            kind: None,
            connected,
            batteries: levels
                .iter()
                .map(|l| DeviceBattery { component: "main".into(), level: Percentage::from_f64(*l) })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_lowest_battery_ignores_disconnected_devices() {
        let mut probe = MockSystemProbe::new();
        probe.expect_bluetooth_devices().returning(|| {
            Ok(vec![
                device("AirPods Pro", true, &[80.0, 35.0]),
                device("Magic Keyboard", true, &[60.0]),
                device("Magic Mouse", false, &[5.0]),
            ])
        });
        let reading = BluetoothSource::new(Arc::new(probe)).read().await.unwrap();

        assert_eq!(reading.primary_value(), Some(2.0));
        assert_eq!(reading.field("lowest_battery"), Some(35.0));
    }
}

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tracing::debug;

use super::SensorsReading;
use crate::{
    core::metrics::{MetricFamily, MetricReading},
    error::Result,
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Temperature and fan source
#[derive(Debug)]
pub struct SensorsSource {
    probe: Arc<dyn SystemProbe>,
}

impl SensorsSource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl MetricSource for SensorsSource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Sensors
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let snapshot = run_blocking(&self.probe, |probe| probe.sensors()).await?;
        debug!(temperatures = snapshot.temperatures.len(), fans = snapshot.fans.len(), "Sampled sensors");
        Ok(MetricReading::Sensors(SensorsReading {
            temperatures: snapshot.temperatures,
            fans: snapshot.fans,
            captured_at: SystemTime::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::types::Temperature,
        platform::MockSystemProbe,
        sensors::{Fan, SensorGroup, SensorSnapshot, TemperatureSensor},
    };

    fn sensor(key: &str, group: SensorGroup, celsius: f64) -> TemperatureSensor {
        TemperatureSensor { key: key.into(), name: key.into(), group, value: Temperature::new(celsius) }
    }

    #[tokio::test]
    async fn test_primary_is_hottest_cpu_sensor() {
        let mut probe = MockSystemProbe::new();
        probe.expect_sensors().returning(|| {
            Ok(SensorSnapshot {
                temperatures: vec![
                    sensor("TC0P", SensorGroup::Cpu, 55.0),
                    sensor("Tp01", SensorGroup::Cpu, 61.5),
                    sensor("TG0P", SensorGroup::Gpu, 70.0),
                    sensor("TB0T", SensorGroup::Battery, 31.0),
                ],
                fans: vec![Fan { id: 0, rpm: 2100.0, min_rpm: Some(1200.0), max_rpm: Some(6000.0) }],
            })
        });
        let reading = SensorsSource::new(Arc::new(probe)).read().await.unwrap();

        assert_eq!(reading.primary_value(), Some(61.5));
        assert_eq!(reading.field("max_temperature"), Some(70.0));
        assert_eq!(reading.field("gpu_temperature"), Some(70.0));
        assert_eq!(reading.field("fan_rpm"), Some(2100.0));
    }

    #[test]
    fn test_fan_speed_percentage() {
        let fan = Fan { id: 0, rpm: 3600.0, min_rpm: Some(1200.0), max_rpm: Some(6000.0) };
        assert_eq!(fan.speed_percentage(), Some(50.0));
        let unknown = Fan { id: 1, rpm: 3600.0, min_rpm: None, max_rpm: Some(6000.0) };
        assert_eq!(unknown.speed_percentage(), None);
    }
}

use std::time::SystemTime;

use serde::Serialize;

use crate::core::{metrics::Series, types::Temperature};

/// Which part of the machine a temperature sensor sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorGroup {
    Cpu,
    Gpu,
    Battery,
    Ambient,
    System,
}

/// One named temperature sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSensor {
    /// Platform key, e.g. the four-character SMC key `TC0P`
    pub key: String,
    pub name: String,
    pub group: SensorGroup,
    pub value: Temperature,
}

/// One fan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fan {
    pub id: u8,
    pub rpm: f64,
    pub min_rpm: Option<f64>,
    pub max_rpm: Option<f64>,
}

impl Fan {
    /// Speed as a share of the fan's range, when the range is known
    pub fn speed_percentage(&self) -> Option<f64> {
        match (self.min_rpm, self.max_rpm) {
            (Some(min), Some(max)) if max > min => Some(((self.rpm - min) / (max - min) * 100.0).clamp(0.0, 100.0)),
            _ => None,
        }
    }
}

/// Everything the sensor probe returns in one pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorSnapshot {
    pub temperatures: Vec<TemperatureSensor>,
    pub fans: Vec<Fan>,
}

/// One sensors sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorsReading {
    pub temperatures: Vec<TemperatureSensor>,
    pub fans: Vec<Fan>,
    pub captured_at: SystemTime,
}

impl SensorsReading {
    /// Hottest sensor in `group`
    pub fn hottest(&self, group: SensorGroup) -> Option<Temperature> {
        max_temperature(self.temperatures.iter().filter(|s| s.group == group))
    }

    /// Hottest sensor overall
    pub fn max_temperature(&self) -> Option<Temperature> {
        max_temperature(self.temperatures.iter())
    }

    /// The primary series is the hottest CPU sensor, falling back to the
    /// hottest sensor of any kind and then to the first fan.
    pub fn series(&self) -> Vec<Series> {
        let mut series = Vec::new();
        let primary = self.hottest(SensorGroup::Cpu).or_else(|| self.max_temperature());
        if let Some(primary) = primary {
            series.push(("temperature", primary.as_celsius()));
        }
        if let Some(max) = self.max_temperature() {
            series.push(("max_temperature", max.as_celsius()));
        }
        if let Some(gpu) = self.hottest(SensorGroup::Gpu) {
            series.push(("gpu_temperature", gpu.as_celsius()));
        }
        if let Some(fan) = self.fans.first() {
            series.push(("fan_rpm", fan.rpm));
        }
        series
    }
}

fn max_temperature<'a>(sensors: impl Iterator<Item = &'a TemperatureSensor>) -> Option<Temperature> {
    sensors
        .map(|s| s.value)
        .fold(None, |max: Option<Temperature>, t| match max {
            Some(m) if m >= t => Some(m),
            _ => Some(t),
        })
}

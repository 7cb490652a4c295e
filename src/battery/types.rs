use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::core::{
    metrics::Series,
    types::{Percentage, Temperature},
};

/// Represents the current power source for the system
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSource {
    /// Running on battery power
    Battery,
    /// Running on AC power
    AC,
    /// Power source could not be determined
    Unknown,
}

/// What the charger is doing with the battery
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    Charging,
    Discharging,
    /// Full and held on AC
    Charged,
    /// On AC but not charging (optimized charging, charge limit)
    NotCharging,
}

/// Battery state as reported by the power-source APIs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryStatus {
    pub level: Percentage,
    pub state: ChargeState,
    pub power_source: PowerSource,
    /// Time to empty when discharging, time to full when charging
    pub time_remaining: Option<Duration>,
    pub cycle_count: Option<u32>,
    /// Current full-charge capacity relative to design capacity
    pub health: Option<Percentage>,
    pub temperature: Option<Temperature>,
}

/// One battery sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryReading {
    pub status: BatteryStatus,
    pub captured_at: SystemTime,
}

impl BatteryReading {
    pub fn series(&self) -> Vec<Series> {
        let status = &self.status;
        let mut series = vec![("level", status.level.as_f64())];
        if let Some(health) = status.health {
            series.push(("health", health.as_f64()));
        }
        if let Some(temperature) = status.temperature {
            series.push(("temperature", temperature.as_celsius()));
        }
        if let Some(remaining) = status.time_remaining {
            series.push(("minutes_remaining", remaining.as_secs_f64() / 60.0));
        }
        if let Some(cycles) = status.cycle_count {
            series.push(("cycle_count", f64::from(cycles)));
        }
        series
    }
}

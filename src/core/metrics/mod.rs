//! # Core Metrics Module
//!
//! The closed set of metric families and the tagged reading type every
//! source produces. Adding a family means adding a variant to both enums,
//! and the compiler then points at every match that needs a new arm.
//!
//! ## Example
//!
//! ```rust
//! use tonic_metrics::core::metrics::MetricFamily;
//!
//! assert_eq!(MetricFamily::Cpu.to_string(), "cpu");
//! assert_eq!(MetricFamily::ALL.len(), 8);
//! ```

use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};

use crate::{
    battery::BatteryReading, bluetooth::BluetoothReading, cpu::CpuReading, disk::DiskReading, gpu::GpuReading,
    memory::MemoryReading, network::NetworkReading, sensors::SensorsReading, Error,
};

/// One category of system telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFamily {
    Cpu,
    Memory,
    Disk,
    Network,
    Gpu,
    Battery,
    Sensors,
    Bluetooth,
}

impl MetricFamily {
    /// Every family, in default menu-bar order
    pub const ALL: [MetricFamily; 8] = [
        MetricFamily::Cpu,
        MetricFamily::Gpu,
        MetricFamily::Memory,
        MetricFamily::Disk,
        MetricFamily::Network,
        MetricFamily::Battery,
        MetricFamily::Sensors,
        MetricFamily::Bluetooth,
    ];

    /// Stable lowercase key used in preferences and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Gpu => "gpu",
            Self::Battery => "battery",
            Self::Sensors => "sensors",
            Self::Bluetooth => "bluetooth",
        }
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricFamily::ALL
            .into_iter()
            .find(|family| family.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_config(format!("unknown metric family: {}", s)))
    }
}

/// A named scalar extracted from a reading (chart series, threshold field)
pub type Series = (&'static str, f64);

/// One point-in-time reading, tagged by family
///
/// Produced exclusively by the family's source and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum MetricReading {
    Cpu(CpuReading),
    Memory(MemoryReading),
    Disk(DiskReading),
    Network(NetworkReading),
    Gpu(GpuReading),
    Battery(BatteryReading),
    Sensors(SensorsReading),
    Bluetooth(BluetoothReading),
}

impl MetricReading {
    /// The family this reading belongs to
    pub fn family(&self) -> MetricFamily {
        match self {
            Self::Cpu(_) => MetricFamily::Cpu,
            Self::Memory(_) => MetricFamily::Memory,
            Self::Disk(_) => MetricFamily::Disk,
            Self::Network(_) => MetricFamily::Network,
            Self::Gpu(_) => MetricFamily::Gpu,
            Self::Battery(_) => MetricFamily::Battery,
            Self::Sensors(_) => MetricFamily::Sensors,
            Self::Bluetooth(_) => MetricFamily::Bluetooth,
        }
    }

    /// Wall-clock time the sample was taken
    pub fn captured_at(&self) -> SystemTime {
        match self {
            Self::Cpu(r) => r.captured_at,
            Self::Memory(r) => r.captured_at,
            Self::Disk(r) => r.captured_at,
            Self::Network(r) => r.captured_at,
            Self::Gpu(r) => r.captured_at,
            Self::Battery(r) => r.captured_at,
            Self::Sensors(r) => r.captured_at,
            Self::Bluetooth(r) => r.captured_at,
        }
    }

    /// All scalar series of this reading. The first entry is the primary one.
    pub fn series(&self) -> Vec<Series> {
        match self {
            Self::Cpu(r) => r.series(),
            Self::Memory(r) => r.series(),
            Self::Disk(r) => r.series(),
            Self::Network(r) => r.series(),
            Self::Gpu(r) => r.series(),
            Self::Battery(r) => r.series(),
            Self::Sensors(r) => r.series(),
            Self::Bluetooth(r) => r.series(),
        }
    }

    /// The value shown in the menu bar and recorded in the default history
    pub fn primary_value(&self) -> Option<f64> {
        self.series().first().map(|(_, value)| *value)
    }

    /// Looks up a named series, e.g. `"system"` on a CPU reading
    pub fn field(&self, name: &str) -> Option<f64> {
        self.series().into_iter().find(|(key, _)| *key == name).map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Percentage;
    use crate::cpu::CpuLoad;

    #[test]
    fn test_family_round_trips_through_str() {
        for family in MetricFamily::ALL {
            assert_eq!(family.as_str().parse::<MetricFamily>().unwrap(), family);
        }
        assert_eq!("CPU".parse::<MetricFamily>().unwrap(), MetricFamily::Cpu);
        assert!("fans".parse::<MetricFamily>().is_err());
    }

    #[test]
    fn test_reading_primary_and_fields() {
        let reading = MetricReading::Cpu(CpuReading {
            load: CpuLoad::new(Percentage::from_f64(30.0), Percentage::from_f64(10.0), Percentage::from_f64(60.0)),
            per_core: vec![],
            frequency_mhz: None,
            temperature: None,
            load_average: None,
            captured_at: SystemTime::UNIX_EPOCH,
        });

        assert_eq!(reading.family(), MetricFamily::Cpu);
        assert_eq!(reading.primary_value(), Some(40.0));
        assert_eq!(reading.field("system"), Some(10.0));
        assert_eq!(reading.field("idle"), Some(60.0));
        assert_eq!(reading.field("temperature"), None);
    }
}

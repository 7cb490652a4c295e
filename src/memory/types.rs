use std::{fmt, time::SystemTime};

use serde::Serialize;

use crate::core::{
    metrics::Series,
    types::{ByteSize, Percentage},
};

/// Memory pressure level indicator
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    /// Normal memory pressure - sufficient memory available
    Normal,
    /// Warning level memory pressure - memory is becoming constrained
    Warning,
    /// Critical memory pressure - system is under severe memory constraints
    Critical,
}

impl PressureLevel {
    /// Maps the kernel's `kern.memorystatus_vm_pressure_level` value
    pub fn from_kernel_level(level: u32) -> Self {
        match level {
            4 => Self::Critical,
            2 => Self::Warning,
            _ => Self::Normal,
        }
    }

    /// Estimates pressure from the share of memory in use, for kernels that
    /// do not report a level
    pub fn from_usage(usage: Percentage) -> Self {
        let usage = usage.as_f64();
        if usage >= CRITICAL_USAGE_THRESHOLD {
            Self::Critical
        } else if usage >= WARNING_USAGE_THRESHOLD {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    /// Numeric form used for charts and thresholds
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::Warning => 2.0,
            Self::Critical => 3.0,
        }
    }
}

const WARNING_USAGE_THRESHOLD: f64 = 85.0;
const CRITICAL_USAGE_THRESHOLD: f64 = 95.0;

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Warning => write!(f, "Warning"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Swap file usage
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize)]
pub struct SwapUsage {
    pub total: ByteSize,
    pub used: ByteSize,
}

/// Raw memory accounting as reported by the OS probe
///
/// `used` already excludes reclaimable cache. `app`, `wired` and
/// `compressed` are the components of `used` the popover breaks out.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub app: u64,
    pub wired: u64,
    pub compressed: u64,
    pub swap: SwapUsage,
    /// Kernel-reported pressure, when the platform has one
    pub pressure: Option<PressureLevel>,
}

/// One memory sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryReading {
    pub total: ByteSize,
    pub used: ByteSize,
    pub free: ByteSize,
    pub app: ByteSize,
    pub wired: ByteSize,
    pub compressed: ByteSize,
    pub pressure: PressureLevel,
    pub swap: SwapUsage,
    pub captured_at: SystemTime,
}

impl MemoryReading {
    pub fn usage(&self) -> Percentage {
        Percentage::of(self.used.as_bytes() as f64, self.total.as_bytes() as f64)
    }

    pub fn series(&self) -> Vec<Series> {
        vec![
            ("usage", self.usage().as_f64()),
            ("pressure", self.pressure.as_f64()),
            ("used_gb", self.used.as_gb()),
            ("app_gb", self.app.as_gb()),
            ("wired_gb", self.wired.as_gb()),
            ("compressed_gb", self.compressed.as_gb()),
            ("swap_gb", self.swap.used.as_gb()),
        ]
    }
}

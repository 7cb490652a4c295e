use std::time::SystemTime;

use serde::Serialize;

use crate::core::{
    metrics::Series,
    types::{ByteSize, Percentage},
};

/// Capacity of one mounted volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeStats {
    pub mount_point: String,
    pub total: u64,
    /// Space available to unprivileged users
    pub available: u64,
}

/// Cumulative bytes moved by all block devices since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskIoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// One disk sample for the monitored volume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskReading {
    pub mount_point: String,
    pub total: ByteSize,
    pub free: ByteSize,
    pub used: ByteSize,
    /// Bytes per second, absent on the first sample or when IO counters are
    /// not readable
    pub read_rate: Option<f64>,
    pub write_rate: Option<f64>,
    pub captured_at: SystemTime,
}

impl DiskReading {
    pub fn usage(&self) -> Percentage {
        Percentage::of(self.used.as_bytes() as f64, self.total.as_bytes() as f64)
    }

    pub fn series(&self) -> Vec<Series> {
        let mut series = vec![("usage", self.usage().as_f64()), ("free_gb", self.free.as_gb())];
        if let Some(read) = self.read_rate {
            series.push(("read", read));
        }
        if let Some(write) = self.write_rate {
            series.push(("write", write));
        }
        series
    }
}

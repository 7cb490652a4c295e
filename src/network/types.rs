use std::{net::IpAddr, time::SystemTime};

use serde::Serialize;

use crate::core::{metrics::Series, types::ByteSize};

/// Cumulative counters of one network interface
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub is_up: bool,
    pub is_loopback: bool,
}

/// One network sample for the primary interface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkReading {
    /// `None` when no interface is up
    pub interface: Option<String>,
    /// Bytes per second
    pub download_rate: f64,
    pub upload_rate: f64,
    /// Packets per second
    pub packets_in_rate: f64,
    pub packets_out_rate: f64,
    pub total_in: ByteSize,
    pub total_out: ByteSize,
    pub public_ip: Option<IpAddr>,
    pub captured_at: SystemTime,
}

impl NetworkReading {
    pub fn series(&self) -> Vec<Series> {
        vec![
            ("download", self.download_rate),
            ("upload", self.upload_rate),
            ("packets_in", self.packets_in_rate),
            ("packets_out", self.packets_out_rate),
        ]
    }
}

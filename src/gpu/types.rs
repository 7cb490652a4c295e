use std::time::SystemTime;

use serde::Serialize;

use crate::core::{metrics::Series, types::Percentage};

/// Utilization of one graphics accelerator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuDevice {
    pub name: String,
    pub utilization: Percentage,
    /// Renderer and tiler shares, reported by Apple GPUs only
    pub renderer: Option<Percentage>,
    pub tiler: Option<Percentage>,
}

/// One GPU sample covering every accelerator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuReading {
    pub devices: Vec<GpuDevice>,
    pub captured_at: SystemTime,
}

impl GpuReading {
    /// Busiest device's utilization
    pub fn usage(&self) -> Percentage {
        self.devices
            .iter()
            .map(|device| device.utilization)
            .fold(Percentage::default(), |max, u| if u > max { u } else { max })
    }

    pub fn series(&self) -> Vec<Series> {
        let mut series = vec![("usage", self.usage().as_f64())];
        if let Some(renderer) = self.devices.iter().find_map(|d| d.renderer) {
            series.push(("renderer", renderer.as_f64()));
        }
        if let Some(tiler) = self.devices.iter().find_map(|d| d.tiler) {
            series.push(("tiler", tiler.as_f64()));
        }
        series
    }
}

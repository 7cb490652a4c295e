use std::{sync::Arc, time::Duration, time::SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{DiskIoCounters, DiskReading, DEFAULT_INTERVAL, DEFAULT_MOUNT_POINT};
use crate::{
    core::{
        metrics::{MetricFamily, MetricReading},
        types::ByteSize,
    },
    error::{Error, Result},
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

/// Disk capacity and throughput source
#[derive(Debug)]
pub struct DiskSource {
    probe: Arc<dyn SystemProbe>,
    mount_point: String,
    previous_io: Mutex<Option<(Instant, DiskIoCounters)>>,
}

impl DiskSource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self::with_mount_point(probe, DEFAULT_MOUNT_POINT)
    }

    pub fn with_mount_point(probe: Arc<dyn SystemProbe>, mount_point: impl Into<String>) -> Self {
        Self { probe, mount_point: mount_point.into(), previous_io: Mutex::new(None) }
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Bytes per second read and written since the previous sample
    fn rates(&self, counters: DiskIoCounters) -> (Option<f64>, Option<f64>) {
        let now = Instant::now();
        let previous = self.previous_io.lock().replace((now, counters));
        let Some((then, before)) = previous else {
            return (None, None);
        };
        let elapsed = now.duration_since(then).as_secs_f64();
        if elapsed <= 0.0 {
            return (None, None);
        }
        (
            Some(counters.read_bytes.saturating_sub(before.read_bytes) as f64 / elapsed),
            Some(counters.write_bytes.saturating_sub(before.write_bytes) as f64 / elapsed),
        )
    }
}

#[async_trait]
impl MetricSource for DiskSource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Disk
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let mount_point = self.mount_point.clone();
        let (volume, io) = run_blocking(&self.probe, move |probe| {
            let volume = probe.volume_stats(&mount_point)?;
            // Throughput is optional, capacity is what the widget shows
            let io = probe
                .disk_io_counters()
                .map_err(|e| trace!(error = %e, "Disk IO counters unavailable"))
                .ok();
            Ok((volume, io))
        })
        .await?;

        if volume.total == 0 {
            return Err(Error::invalid_data(format!("{} reports zero capacity", volume.mount_point)));
        }
        let (read_rate, write_rate) = io.map(|io| self.rates(io)).unwrap_or((None, None));
        let free = volume.available.min(volume.total);

        let reading = DiskReading {
            mount_point: volume.mount_point,
            total: ByteSize::new(volume.total),
            free: ByteSize::new(free),
            used: ByteSize::new(volume.total - free),
            read_rate,
            write_rate,
            captured_at: SystemTime::now(),
        };
        debug!(mount_point = %reading.mount_point, usage = %reading.usage(), "Sampled disk");
        Ok(MetricReading::Disk(reading))
    }
}

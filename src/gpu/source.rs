use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tracing::debug;

use super::GpuReading;
use crate::{
    core::metrics::{MetricFamily, MetricReading},
    error::{Error, Result},
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// GPU utilization source
#[derive(Debug)]
pub struct GpuSource {
    probe: Arc<dyn SystemProbe>,
}

impl GpuSource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl MetricSource for GpuSource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Gpu
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let devices = run_blocking(&self.probe, |probe| probe.gpu_devices()).await?;
        if devices.is_empty() {
            return Err(Error::unavailable("no GPU reports utilization"));
        }
        let reading = GpuReading { devices, captured_at: SystemTime::now() };
        debug!(devices = reading.devices.len(), usage = %reading.usage(), "Sampled GPU");
        Ok(MetricReading::Gpu(reading))
    }
}

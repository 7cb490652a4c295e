use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tracing::debug;

use super::{MemoryReading, MemoryStats, PressureLevel};
use crate::{
    core::{
        metrics::{MetricFamily, MetricReading},
        types::{ByteSize, Percentage},
    },
    error::{Error, Result},
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Memory usage source
#[derive(Debug)]
pub struct MemorySource {
    probe: Arc<dyn SystemProbe>,
}

impl MemorySource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe }
    }

    fn reading(stats: MemoryStats) -> Result<MemoryReading> {
        if stats.total == 0 {
            return Err(Error::invalid_data("total memory reported as zero"));
        }
        let used = stats.used.min(stats.total);
        let pressure = stats
            .pressure
            .unwrap_or_else(|| PressureLevel::from_usage(Percentage::of(used as f64, stats.total as f64)));

        Ok(MemoryReading {
            total: ByteSize::new(stats.total),
            used: ByteSize::new(used),
            free: ByteSize::new(stats.total - used),
            app: ByteSize::new(stats.app),
            wired: ByteSize::new(stats.wired),
            compressed: ByteSize::new(stats.compressed),
            pressure,
            swap: stats.swap,
            captured_at: SystemTime::now(),
        })
    }
}

#[async_trait]
impl MetricSource for MemorySource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Memory
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let stats = run_blocking(&self.probe, |probe| probe.memory_stats()).await?;
        let reading = Self::reading(stats)?;
        debug!(usage = %reading.usage(), pressure = %reading.pressure, "Sampled memory");
        Ok(MetricReading::Memory(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::SwapUsage, platform::MockSystemProbe};

    const GB: u64 = 1024 * 1024 * 1024;

    fn source(stats: MemoryStats) -> MemorySource {
        let mut probe = MockSystemProbe::new();
        probe.expect_memory_stats().returning(move || Ok(stats));
        MemorySource::new(Arc::new(probe))
    }

    #[tokio::test]
    async fn test_breakdown_and_kernel_pressure() {
        let stats = MemoryStats {
            total: 16 * GB,
            used: 12 * GB,
            app: 8 * GB,
            wired: 3 * GB,
            compressed: GB,
            swap: SwapUsage { total: ByteSize::new(2 * GB), used: ByteSize::new(GB) },
            pressure: Some(PressureLevel::Warning),
        };
        let MetricReading::Memory(reading) = source(stats).read().await.unwrap() else {
            panic!("expected a memory reading");
        };
        assert_eq!(reading.usage().as_f64(), 75.0);
        assert_eq!(reading.free.as_gb(), 4.0);
        assert_eq!(reading.pressure, PressureLevel::Warning);
        assert_eq!(reading.swap.used.as_gb(), 1.0);
    }

    #[tokio::test]
    async fn test_pressure_estimated_without_kernel_level() {
        let stats = MemoryStats { total: 100 * GB, used: 96 * GB, ..Default::default() };
        let MetricReading::Memory(reading) = source(stats).read().await.unwrap() else {
            panic!("expected a memory reading");
        };
        assert_eq!(reading.pressure, PressureLevel::Critical);
    }

    #[tokio::test]
    async fn test_zero_total_is_invalid() {
        let err = source(MemoryStats::default()).read().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::SourceErrorKind::InvalidData);
    }
}

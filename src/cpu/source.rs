use std::{sync::Arc, time::Duration, time::SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{CpuLoad, CpuReading, CpuTicks, LoadAverage};
use crate::{
    core::{
        metrics::{MetricFamily, MetricReading},
        types::{Percentage, Temperature},
    },
    error::Result,
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

/// Default polling interval for CPU usage
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

struct RawSample {
    ticks: Vec<CpuTicks>,
    frequency_mhz: Option<f64>,
    temperature: Option<Temperature>,
    load_average: Option<LoadAverage>,
}

/// CPU usage source
///
/// Usage is the tick delta between two consecutive reads. The first read has
/// no previous sample and reports the averages since boot.
#[derive(Debug)]
pub struct CpuSource {
    probe: Arc<dyn SystemProbe>,
    previous: Mutex<Option<Vec<CpuTicks>>>,
}

impl CpuSource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe, previous: Mutex::new(None) }
    }

    /// Turns cumulative counters into the package load and per-core busy
    /// shares of the window since the previous call
    fn window(&self, ticks: Vec<CpuTicks>) -> (CpuLoad, Vec<Percentage>) {
        let mut previous = self.previous.lock();
        let windows: Vec<CpuTicks> = match previous.as_ref() {
            Some(before) if before.len() == ticks.len() => {
                ticks.iter().zip(before).map(|(now, before)| now.since(before)).collect()
            },
            _ => ticks.clone(),
        };
        *previous = Some(ticks);

        let package = windows.iter().fold(CpuTicks::default(), |sum, core| sum + *core);
        (package.load(), windows.iter().map(|core| core.load().total()).collect())
    }
}

#[async_trait]
impl MetricSource for CpuSource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Cpu
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let raw = run_blocking(&self.probe, |probe| {
            Ok(RawSample {
                ticks: probe.cpu_ticks()?,
                frequency_mhz: probe.cpu_frequency_mhz().ok(),
                temperature: probe.cpu_temperature().ok(),
                load_average: probe.load_average().ok(),
            })
        })
        .await?;

        let (load, per_core) = self.window(raw.ticks);
        debug!(usage = %load.total(), cores = per_core.len(), "Sampled CPU");

        Ok(MetricReading::Cpu(CpuReading {
            load,
            per_core,
            frequency_mhz: raw.frequency_mhz,
            temperature: raw.temperature,
            load_average: raw.load_average,
            captured_at: SystemTime::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, platform::MockSystemProbe};

    fn probe_with_ticks(samples: Vec<Vec<CpuTicks>>) -> Arc<dyn SystemProbe> {
        let mut probe = MockSystemProbe::new();
        let mut samples = samples.into_iter();
        probe.expect_cpu_ticks().returning(move || Ok(samples.next().unwrap_or_default()));
        probe.expect_cpu_frequency_mhz().returning(|| Err(Error::unavailable("apple silicon")));
        probe.expect_cpu_temperature().returning(|| Ok(Temperature::new(48.0)));
        probe.expect_load_average().returning(|| Ok(LoadAverage { one: 1.5, five: 1.0, fifteen: 0.5 }));
        Arc::new(probe)
    }

    fn cpu(reading: MetricReading) -> CpuReading {
        match reading {
            MetricReading::Cpu(cpu) => cpu,
            other => panic!("expected a CPU reading, got {:?}", other.family()),
        }
    }

    #[test]
    fn test_tick_window_shares() {
        // 30 user + 10 nice + 20 system + 40 idle out of 100
        let load = CpuTicks::new(30, 20, 40, 10).load();
        assert_eq!(load.user.as_f64(), 40.0);
        assert_eq!(load.system.as_f64(), 20.0);
        assert_eq!(load.idle.as_f64(), 40.0);
        assert_eq!(load.total().as_f64(), 60.0);
    }

    #[test]
    fn test_empty_window_is_idle() {
        let load = CpuTicks::default().load();
        assert_eq!(load.idle.as_f64(), 100.0);
        assert_eq!(load.total().as_f64(), 0.0);
    }

    #[test]
    fn test_wrapped_counter_delta() {
        let before = CpuTicks::new(u64::from(u32::MAX) - 9, 100, 1_000, 0);
        let now = CpuTicks::new(10, 120, 1_060, 0);
        assert_eq!(now.since(&before), CpuTicks::new(20, 20, 60, 0));

        // a 64-bit counter going backwards means a reset, not a wrap
        let before = CpuTicks::new(u64::from(u32::MAX) + 50, 0, 0, 0);
        assert_eq!(CpuTicks::new(10, 0, 0, 0).since(&before).user, 0);
    }

    #[tokio::test]
    async fn test_wrap_between_reads_is_counted() {
        let first = vec![CpuTicks::new(u64::from(u32::MAX) - 29, 0, 1_000, 0)];
        let second = vec![CpuTicks::new(20, 0, 1_050, 0)];
        let source = CpuSource::new(probe_with_ticks(vec![first, second]));
        source.read().await.unwrap();

        // 50 user and 50 idle ticks across the wrap
        let reading = cpu(source.read().await.unwrap());
        assert_eq!(reading.load.user.as_f64(), 50.0);
        assert_eq!(reading.per_core[0].as_f64(), 50.0);
    }

    #[tokio::test]
    async fn test_second_read_uses_delta() {
        let first = vec![CpuTicks::new(1000, 500, 8500, 0), CpuTicks::new(1000, 500, 8500, 0)];
        let second = vec![CpuTicks::new(1080, 510, 8510, 0), CpuTicks::new(1010, 500, 8590, 0)];
        let source = CpuSource::new(probe_with_ticks(vec![first, second]));

        let initial = cpu(source.read().await.unwrap());
        assert_eq!(initial.total_usage().as_f64(), 15.0);

        let reading = cpu(source.read().await.unwrap());
        // package: user 90, system 10, idle 100 over 200 ticks
        assert_eq!(reading.load.user.as_f64(), 45.0);
        assert_eq!(reading.load.system.as_f64(), 5.0);
        assert_eq!(reading.load.idle.as_f64(), 50.0);
        assert_eq!(reading.per_core[0].as_f64(), 90.0);
        assert_eq!(reading.per_core[1].as_f64(), 10.0);
        assert_eq!(reading.frequency_mhz, None);
        assert_eq!(reading.temperature, Some(Temperature::new(48.0)));
        assert_eq!(reading.load_average.map(|l| l.one), Some(1.5));

        let sum = reading.load.user.as_f64() + reading.load.system.as_f64() + reading.load.idle.as_f64();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_tick_failure_propagates() {
        let mut probe = MockSystemProbe::new();
        probe.expect_cpu_ticks().returning(|| Err(Error::system("host_processor_info failed: 5")));
        let source = CpuSource::new(Arc::new(probe));
        assert!(source.read().await.is_err());
    }
}

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tonic_metrics::{
    cpu::{CpuLoad, CpuReading},
    disk::DiskReading,
    prelude::*,
};

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Step {
    Value(f64),
    Slow(Duration, f64),
    Fail(SourceErrorKind),
}

/// Source that replays a script and then keeps repeating its last step
#[derive(Debug)]
pub struct ScriptedSource {
    family: MetricFamily,
    interval: Duration,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: AtomicU64,
}

impl ScriptedSource {
    pub fn new(family: MetricFamily, interval: Duration, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            family,
            interval,
            script: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(Step::Value(0.0)),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut last = self.last.lock();
        if let Some(step) = self.script.lock().pop_front() {
            *last = step;
        }
        last.clone()
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    fn family(&self) -> MetricFamily {
        self.family
    }

    fn preferred_interval(&self) -> Duration {
        self.interval
    }

    async fn read(&self) -> Result<MetricReading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = match self.next_step() {
            Step::Value(value) => value,
            Step::Slow(delay, value) => {
                tokio::time::sleep(delay).await;
                value
            },
            Step::Fail(kind) => return Err(failure(kind)),
        };
        Ok(match self.family {
            MetricFamily::Disk => disk_reading(value),
            _ => cpu_reading(value),
        })
    }
}

fn failure(kind: SourceErrorKind) -> Error {
    match kind {
        SourceErrorKind::Unavailable => Error::SourceUnavailable("not present".into()),
        SourceErrorKind::PermissionDenied => Error::PermissionDenied("full disk access required".into()),
        SourceErrorKind::Timeout => Error::Timeout("too slow".into()),
        SourceErrorKind::InvalidData => Error::InvalidData("garbage".into()),
    }
}

pub fn cpu_reading(usage: f64) -> MetricReading {
    MetricReading::Cpu(CpuReading {
        load: CpuLoad::new(Percentage::from_f64(usage), Percentage::from_f64(0.0), Percentage::from_f64(100.0 - usage)),
        per_core: vec![],
        frequency_mhz: None,
        temperature: None,
        load_average: None,
        captured_at: SystemTime::now(),
    })
}

/// Disk reading of a 1000-byte volume `usage` percent full
pub fn disk_reading(usage: f64) -> MetricReading {
    let total = 1_000u64;
    let used = (usage * 10.0).round() as u64;
    MetricReading::Disk(DiskReading {
        mount_point: "/".into(),
        total: ByteSize::new(total),
        free: ByteSize::new(total - used),
        used: ByteSize::new(used),
        read_rate: None,
        write_rate: None,
        captured_at: SystemTime::now(),
    })
}

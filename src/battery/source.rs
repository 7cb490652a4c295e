use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tracing::debug;

use super::BatteryReading;
use crate::{
    core::metrics::{MetricFamily, MetricReading},
    error::{Error, Result},
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Battery source
#[derive(Debug)]
pub struct BatterySource {
    probe: Arc<dyn SystemProbe>,
}

impl BatterySource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl MetricSource for BatterySource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Battery
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let status = run_blocking(&self.probe, |probe| probe.battery_status())
            .await?
            .ok_or_else(|| Error::unavailable("no battery present"))?;
        debug!(level = %status.level, state = ?status.state, "Sampled battery");
        Ok(MetricReading::Battery(BatteryReading { status, captured_at: SystemTime::now() }))
    }
}

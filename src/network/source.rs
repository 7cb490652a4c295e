use std::{
    net::IpAddr,
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{
    InterfaceCounters, NetworkReading, PublicIpLookup, TrafficTracker, DEFAULT_INTERVAL, PUBLIC_IP_REFRESH,
    VIRTUAL_INTERFACE_PREFIXES,
};
use crate::{
    core::{
        metrics::{MetricFamily, MetricReading},
        types::ByteSize,
    },
    error::Result,
    platform::{run_blocking, SystemProbe},
    traits::MetricSource,
};

#[derive(Debug, Default)]
struct PublicIpState {
    address: Option<IpAddr>,
    last_attempt: Option<Instant>,
    in_flight: bool,
}

/// Network throughput source for the primary interface
///
/// The primary interface is the configured one, or else the busiest
/// interface that is up and neither loopback nor a virtual tunnel.
#[derive(Debug)]
pub struct NetworkSource {
    probe: Arc<dyn SystemProbe>,
    interface: Option<String>,
    tracker: Mutex<Option<TrafficTracker>>,
    public_ip: Option<Arc<dyn PublicIpLookup>>,
    public_ip_state: Arc<Mutex<PublicIpState>>,
}

impl NetworkSource {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self {
            probe,
            interface: None,
            tracker: Mutex::new(None),
            public_ip: None,
            public_ip_state: Arc::new(Mutex::new(PublicIpState::default())),
        }
    }

    /// Pins the source to one interface
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    /// Enables the public IP lookup
    pub fn with_public_ip(mut self, lookup: Arc<dyn PublicIpLookup>) -> Self {
        self.public_ip = Some(lookup);
        self
    }

    fn primary<'a>(&self, interfaces: &'a [InterfaceCounters]) -> Option<&'a InterfaceCounters> {
        if let Some(name) = &self.interface {
            return interfaces.iter().find(|i| &i.name == name);
        }
        interfaces
            .iter()
            .filter(|i| i.is_up && !i.is_loopback)
            .filter(|i| !VIRTUAL_INTERFACE_PREFIXES.iter().any(|p| i.name.starts_with(p)))
            .max_by_key(|i| i.bytes_in.saturating_add(i.bytes_out))
    }

    /// Returns the cached public address and, when the last attempt is
    /// older than [`PUBLIC_IP_REFRESH`], starts a lookup in the background.
    /// A failed lookup keeps the previous address.
    fn public_ip(&self) -> Option<IpAddr> {
        let lookup = self.public_ip.as_ref()?;
        let now = Instant::now();
        let mut state = self.public_ip_state.lock();
        let due = !state.in_flight && state.last_attempt.map_or(true, |t| now.duration_since(t) >= PUBLIC_IP_REFRESH);
        if due {
            state.last_attempt = Some(now);
            state.in_flight = true;
            tokio::spawn(refresh_public_ip(Arc::clone(lookup), Arc::clone(&self.public_ip_state)));
        }
        state.address
    }
}

async fn refresh_public_ip(lookup: Arc<dyn PublicIpLookup>, state: Arc<Mutex<PublicIpState>>) {
    let result = lookup.lookup().await;
    let mut state = state.lock();
    state.in_flight = false;
    match result {
        Ok(address) => {
            debug!(%address, "Refreshed public IP");
            state.address = Some(address);
        },
        Err(e) => warn!(error = %e, "Public IP lookup failed, keeping previous address"),
    }
}

#[async_trait]
impl MetricSource for NetworkSource {
    fn family(&self) -> MetricFamily {
        MetricFamily::Network
    }

    fn preferred_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }

    async fn read(&self) -> Result<MetricReading> {
        let interfaces = run_blocking(&self.probe, |probe| probe.interface_counters()).await?;

        let mut reading = NetworkReading {
            interface: None,
            download_rate: 0.0,
            upload_rate: 0.0,
            packets_in_rate: 0.0,
            packets_out_rate: 0.0,
            total_in: ByteSize::new(0),
            total_out: ByteSize::new(0),
            public_ip: self.public_ip(),
            captured_at: SystemTime::now(),
        };

        let mut guard = self.tracker.lock();
        match self.primary(&interfaces) {
            Some(counters) => {
                let known = guard.is_some();
                let tracker = guard.get_or_insert_with(|| TrafficTracker::new(counters));
                if known {
                    tracker.update(counters);
                }
                reading.interface = Some(counters.name.clone());
                reading.download_rate = tracker.download_speed();
                reading.upload_rate = tracker.upload_speed();
                reading.packets_in_rate = tracker.packet_receive_rate();
                reading.packets_out_rate = tracker.packet_send_rate();
                reading.total_in = ByteSize::new(tracker.bytes_received());
                reading.total_out = ByteSize::new(tracker.bytes_sent());
            },
            None => *guard = None,
        }

        Ok(MetricReading::Network(reading))
    }
}

use tokio::time::Instant;

use super::InterfaceCounters;

/// Represents a network traffic data point with received and sent data.
#[derive(Debug, Clone, Copy)]
pub struct TrafficData {
    /// Time when this data point was collected
    pub timestamp: Instant,

    /// Total bytes received
    pub bytes_received: u64,

    /// Total bytes sent
    pub bytes_sent: u64,

    /// Total packets received
    pub packets_received: u64,

    /// Total packets sent
    pub packets_sent: u64,
}

impl TrafficData {
    fn from_counters(counters: &InterfaceCounters) -> Self {
        Self {
            timestamp: Instant::now(),
            bytes_received: counters.bytes_in,
            bytes_sent: counters.bytes_out,
            packets_received: counters.packets_in,
            packets_sent: counters.packets_out,
        }
    }
}

/// Tracks the traffic of one interface over time and calculates rates.
///
/// Switching to another interface starts over, since counters of two
/// interfaces cannot be subtracted.
#[derive(Debug, Clone)]
pub struct TrafficTracker {
    interface: String,

    /// Current network traffic data
    current: TrafficData,

    /// Previous network traffic data for rate calculations
    previous: Option<TrafficData>,
}

impl TrafficTracker {
    pub fn new(counters: &InterfaceCounters) -> Self {
        Self { interface: counters.name.clone(), current: TrafficData::from_counters(counters), previous: None }
    }

    /// Records a new sample and shifts current data to previous.
    pub fn update(&mut self, counters: &InterfaceCounters) {
        if counters.name != self.interface {
            *self = Self::new(counters);
            return;
        }
        self.previous = Some(self.current);
        self.current = TrafficData::from_counters(counters);
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Gets the current bytes received count.
    pub fn bytes_received(&self) -> u64 {
        self.current.bytes_received
    }

    /// Gets the current bytes sent count.
    pub fn bytes_sent(&self) -> u64 {
        self.current.bytes_sent
    }

    fn rate(&self, counter: impl Fn(&TrafficData) -> u64) -> f64 {
        let Some(prev) = self.previous else {
            return 0.0;
        };
        let diff = counter(&self.current).saturating_sub(counter(&prev));
        let time_diff = self.current.timestamp.duration_since(prev.timestamp).as_secs_f64();
        if time_diff > 0.0 {
            diff as f64 / time_diff
        } else {
            0.0
        }
    }

    /// Calculates the current download speed in bytes per second.
    /// Returns 0.0 if there's no previous data point for comparison.
    pub fn download_speed(&self) -> f64 {
        self.rate(|d| d.bytes_received)
    }

    /// Calculates the current upload speed in bytes per second.
    /// Returns 0.0 if there's no previous data point for comparison.
    pub fn upload_speed(&self) -> f64 {
        self.rate(|d| d.bytes_sent)
    }

    /// Calculates the packet receive rate (packets per second).
    pub fn packet_receive_rate(&self) -> f64 {
        self.rate(|d| d.packets_received)
    }

    /// Calculates the packet send rate (packets per second).
    pub fn packet_send_rate(&self) -> f64 {
        self.rate(|d| d.packets_sent)
    }
}

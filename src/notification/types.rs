use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

use crate::core::metrics::{MetricFamily, MetricReading};

/// Cooldown applied when a threshold does not set one
pub const DEFAULT_MINIMUM_INTERVAL_SECS: u64 = 60;

/// How a reading is compared with the trigger value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Comparison {
    pub fn holds(self, value: f64, trigger: f64) -> bool {
        match self {
            Self::GreaterThan => value > trigger,
            Self::GreaterThanOrEqual => value >= trigger,
            Self::LessThan => value < trigger,
            Self::LessThanOrEqual => value <= trigger,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A user-configured alert on one series of one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationThreshold {
    pub id: String,
    pub family: MetricFamily,
    /// Series to compare; the family's primary series when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub comparison: Comparison,
    pub value: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_minimum_interval_secs")]
    pub minimum_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_minimum_interval_secs() -> u64 {
    DEFAULT_MINIMUM_INTERVAL_SECS
}

impl NotificationThreshold {
    pub fn new(id: impl Into<String>, family: MetricFamily, comparison: Comparison, value: f64) -> Self {
        Self {
            id: id.into(),
            family,
            field: None,
            comparison,
            value,
            enabled: true,
            minimum_interval_secs: DEFAULT_MINIMUM_INTERVAL_SECS,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_minimum_interval(mut self, interval: Duration) -> Self {
        self.minimum_interval_secs = interval.as_secs();
        self
    }

    pub fn minimum_interval(&self) -> Duration {
        Duration::from_secs(self.minimum_interval_secs)
    }

    /// Value of the watched series in `reading`
    pub fn observe(&self, reading: &MetricReading) -> Option<f64> {
        match &self.field {
            Some(field) => reading.field(field),
            None => reading.primary_value(),
        }
    }
}

/// Do-not-disturb policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "until", rename_all = "snake_case")]
pub enum DoNotDisturb {
    #[default]
    Off,
    On,
    /// Suppress until the given wall-clock time
    Until(SystemTime),
}

impl DoNotDisturb {
    pub fn suppresses(&self, now: SystemTime) -> bool {
        match self {
            Self::Off => false,
            Self::On => true,
            Self::Until(until) => now < *until,
        }
    }
}

/// An alert ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub threshold_id: String,
    pub family: MetricFamily,
    pub field: String,
    pub value: f64,
    pub comparison: Comparison,
    pub trigger: f64,
}

impl Notification {
    pub fn title(&self) -> String {
        format!("{} alert", self.family.as_str().to_uppercase())
    }

    pub fn body(&self) -> String {
        format!("{} is {:.1} ({} {})", self.field, self.value, self.comparison, self.trigger)
    }
}

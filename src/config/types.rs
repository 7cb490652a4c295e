use std::{ops::RangeInclusive, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    core::metrics::MetricFamily,
    error::{Error, Result},
    notification::{DoNotDisturb, NotificationThreshold},
    scheduler::{self, FamilySettings},
};

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 3;

pub const DEFAULT_HISTORY_LENGTH: usize = 60;
pub const HISTORY_LENGTH_RANGE: RangeInclusive<usize> = 10..=1000;

/// How a widget renders in the menu bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visualization {
    #[default]
    Mini,
    Text,
    LineChart,
    BarChart,
    Pie,
    Speed,
    Battery,
}

impl Visualization {
    fn default_for(family: MetricFamily) -> Self {
        match family {
            MetricFamily::Network => Self::Speed,
            MetricFamily::Battery => Self::Battery,
            MetricFamily::Bluetooth | MetricFamily::Sensors => Self::Text,
            _ => Self::Mini,
        }
    }
}

/// Per-widget settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfiguration {
    pub family: MetricFamily,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub visualization: Visualization,
    /// `#rrggbb`, or the system accent color when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    /// Overrides the source's preferred interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval_secs: Option<u64>,
    #[serde(default = "default_history_length")]
    pub history_length: usize,
    #[serde(default)]
    pub thresholds: Vec<NotificationThreshold>,
}

fn default_true() -> bool {
    true
}

fn default_history_length() -> usize {
    DEFAULT_HISTORY_LENGTH
}

impl WidgetConfiguration {
    pub fn new(family: MetricFamily) -> Self {
        Self {
            family,
            enabled: true,
            visualization: Visualization::default_for(family),
            accent_color: None,
            update_interval_secs: None,
            history_length: DEFAULT_HISTORY_LENGTH,
            thresholds: Vec::new(),
        }
    }

    pub fn update_interval(&self) -> Option<Duration> {
        self.update_interval_secs.map(Duration::from_secs)
    }

    /// Runtime settings handed to the scheduler
    pub fn scheduler_settings(&self) -> FamilySettings {
        FamilySettings { enabled: self.enabled, interval: self.update_interval() }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(interval) = self.update_interval() {
            scheduler::validate_interval(interval)?;
        }
        if !HISTORY_LENGTH_RANGE.contains(&self.history_length) {
            return Err(Error::invalid_config(format!(
                "history length must be between {} and {}, got {}",
                HISTORY_LENGTH_RANGE.start(),
                HISTORY_LENGTH_RANGE.end(),
                self.history_length
            )));
        }
        if let Some(color) = &self.accent_color {
            if !is_hex_color(color) {
                return Err(Error::invalid_config(format!("invalid accent color: {}", color)));
            }
        }
        if let Some(threshold) = self.thresholds.iter().find(|t| t.family != self.family) {
            return Err(Error::invalid_config(format!(
                "threshold {} watches {} but belongs to the {} widget",
                threshold.id, threshold.family, self.family
            )));
        }
        Ok(())
    }

    /// Replaces out-of-range values loaded from disk with defaults
    fn sanitize(&mut self) {
        if self.update_interval().is_some_and(|i| scheduler::validate_interval(i).is_err()) {
            warn!(family = %self.family, secs = ?self.update_interval_secs, "Dropping out-of-range interval override");
            self.update_interval_secs = None;
        }
        if !HISTORY_LENGTH_RANGE.contains(&self.history_length) {
            self.history_length =
                self.history_length.clamp(*HISTORY_LENGTH_RANGE.start(), *HISTORY_LENGTH_RANGE.end());
        }
        if self.accent_color.as_deref().is_some_and(|c| !is_hex_color(c)) {
            self.accent_color = None;
        }
        let family = self.family;
        self.thresholds.retain(|t| t.family == family);
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7 && color.starts_with('#') && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Everything the user configures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub schema_version: u32,
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub do_not_disturb: DoNotDisturb,
    /// Widgets in menu-bar order
    pub widgets: Vec<WidgetConfiguration>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            refresh_interval_secs: scheduler::DEFAULT_INTERVAL.as_secs(),
            do_not_disturb: DoNotDisturb::Off,
            widgets: MetricFamily::ALL.into_iter().map(WidgetConfiguration::new).collect(),
        }
    }
}

impl Preferences {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn widget(&self, family: MetricFamily) -> Option<&WidgetConfiguration> {
        self.widgets.iter().find(|w| w.family == family)
    }

    /// Every threshold of every widget
    pub fn thresholds(&self) -> Vec<NotificationThreshold> {
        self.widgets.iter().flat_map(|w| w.thresholds.iter().cloned()).collect()
    }

    /// Fixes up a freshly loaded document: one widget per family, values in
    /// range.
    pub(crate) fn normalize(&mut self) {
        if scheduler::validate_interval(self.refresh_interval()).is_err() {
            warn!(secs = self.refresh_interval_secs, "Resetting out-of-range refresh interval");
            self.refresh_interval_secs = scheduler::DEFAULT_INTERVAL.as_secs();
        }
        let mut seen = Vec::with_capacity(self.widgets.len());
        self.widgets.retain(|w| {
            if seen.contains(&w.family) {
                false
            } else {
                seen.push(w.family);
                true
            }
        });
        for widget in &mut self.widgets {
            widget.sanitize();
        }
        for family in MetricFamily::ALL {
            if !seen.contains(&family) {
                self.widgets.push(WidgetConfiguration::new(family));
            }
        }
    }
}

use std::{collections::HashMap, time::SystemTime};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{DoNotDisturb, Notification, NotificationThreshold};
use crate::core::metrics::MetricReading;

/// Debounce state of one threshold
///
/// `Armed → Fired → CoolingDown → Armed`: a threshold fires on a
/// not-met → met transition, stays `Fired` while the condition holds and
/// cools down for its minimum interval once the condition clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdState {
    Armed,
    Fired { at: Instant },
    CoolingDown { until: Instant },
}

#[derive(Debug, Clone, Copy)]
struct Tracker {
    met: bool,
    state: ThresholdState,
}

impl Default for Tracker {
    fn default() -> Self {
        Self { met: false, state: ThresholdState::Armed }
    }
}

#[derive(Debug, Default)]
struct CheckerState {
    thresholds: Vec<NotificationThreshold>,
    trackers: HashMap<String, Tracker>,
    dnd: DoNotDisturb,
}

/// Evaluates fresh readings against the configured thresholds
#[derive(Debug, Default)]
pub struct ThresholdChecker {
    inner: Mutex<CheckerState>,
}

impl ThresholdChecker {
    pub fn new(thresholds: Vec<NotificationThreshold>) -> Self {
        let checker = Self::default();
        checker.replace_thresholds(thresholds);
        checker
    }

    /// Installs a new threshold set. Thresholds whose id survives keep their
    /// debounce state.
    pub fn replace_thresholds(&self, thresholds: Vec<NotificationThreshold>) {
        let mut inner = self.inner.lock();
        let mut trackers = HashMap::with_capacity(thresholds.len());
        for threshold in &thresholds {
            let tracker = inner.trackers.get(&threshold.id).copied().unwrap_or_default();
            trackers.insert(threshold.id.clone(), tracker);
        }
        inner.trackers = trackers;
        inner.thresholds = thresholds;
    }

    pub fn thresholds(&self) -> Vec<NotificationThreshold> {
        self.inner.lock().thresholds.clone()
    }

    pub fn set_do_not_disturb(&self, dnd: DoNotDisturb) {
        self.inner.lock().dnd = dnd;
    }

    pub fn do_not_disturb(&self) -> DoNotDisturb {
        self.inner.lock().dnd
    }

    pub fn state(&self, id: &str) -> Option<ThresholdState> {
        self.inner.lock().trackers.get(id).map(|tracker| tracker.state)
    }

    /// Returns the notifications `reading` triggers at `now`
    pub fn evaluate(&self, reading: &MetricReading, now: Instant) -> Vec<Notification> {
        let family = reading.family();
        let mut guard = self.inner.lock();
        let CheckerState { thresholds, trackers, dnd } = &mut *guard;
        let suppressed = dnd.suppresses(SystemTime::now());
        let mut fired = Vec::new();

        for threshold in thresholds.iter().filter(|t| t.enabled && t.family == family) {
            let Some(value) = threshold.observe(reading) else {
                continue;
            };
            let tracker = trackers.entry(threshold.id.clone()).or_default();
            let met = threshold.comparison.holds(value, threshold.value);

            if let ThresholdState::Fired { at } = tracker.state {
                if !met {
                    tracker.state = ThresholdState::CoolingDown { until: at + threshold.minimum_interval() };
                }
            }
            if let ThresholdState::CoolingDown { until } = tracker.state {
                if now >= until {
                    tracker.state = ThresholdState::Armed;
                }
            }

            let crossed = met && !tracker.met;
            tracker.met = met;
            if !crossed || tracker.state != ThresholdState::Armed {
                continue;
            }
            if suppressed {
                debug!(id = %threshold.id, value, "Threshold crossed during do-not-disturb");
                continue;
            }

            tracker.state = ThresholdState::Fired { at: now };
            let field = threshold.field.clone().unwrap_or_else(|| primary_name(reading));
            info!(id = %threshold.id, %family, %field, value, "Threshold fired");
            fired.push(Notification {
                threshold_id: threshold.id.clone(),
                family,
                field,
                value,
                comparison: threshold.comparison,
                trigger: threshold.value,
            });
        }
        fired
    }
}

fn primary_name(reading: &MetricReading) -> String {
    reading.series().first().map(|(name, _)| (*name).to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        core::{metrics::MetricFamily, types::Percentage},
        cpu::{CpuLoad, CpuReading},
        notification::Comparison,
    };

    fn cpu(usage: f64) -> MetricReading {
        let user = usage / 2.0;
        MetricReading::Cpu(CpuReading {
            load: CpuLoad::new(
                Percentage::from_f64(user),
                Percentage::from_f64(usage - user),
                Percentage::from_f64(100.0 - usage),
            ),
            per_core: vec![],
            frequency_mhz: None,
            temperature: None,
            load_average: None,
            captured_at: SystemTime::now(),
        })
    }

    fn checker() -> ThresholdChecker {
        ThresholdChecker::new(vec![NotificationThreshold::new("cpu-hot", MetricFamily::Cpu, Comparison::GreaterThan, 80.0)])
    }

    #[test]
    fn test_fires_once_on_crossing() {
        let checker = checker();
        let start = Instant::now();

        let fired = checker.evaluate(&cpu(87.0), start);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].field, "usage");
        assert_eq!(fired[0].value, 87.0);
        assert!(checker.evaluate(&cpu(45.0), start + Duration::from_secs(1)).is_empty());
        assert_eq!(
            checker.state("cpu-hot"),
            Some(ThresholdState::CoolingDown { until: start + Duration::from_secs(60) })
        );
    }

    #[test]
    fn test_no_refire_while_condition_holds() {
        let checker = checker();
        let start = Instant::now();
        let mut fired = 0;
        for secs in 0..300 {
            fired += checker.evaluate(&cpu(95.0), start + Duration::from_secs(secs)).len();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_flapping_value_fires_at_most_once_per_interval() {
        let checker = checker();
        let start = Instant::now();
        let mut fired_at = Vec::new();
        for secs in 0..=150u64 {
            let usage = if secs % 2 == 0 { 90.0 } else { 50.0 };
            if !checker.evaluate(&cpu(usage), start + Duration::from_secs(secs)).is_empty() {
                fired_at.push(secs);
            }
        }
        assert_eq!(fired_at, vec![0, 60, 120]);
    }

    #[test]
    fn test_do_not_disturb_suppresses() {
        let checker = checker();
        let start = Instant::now();
        checker.set_do_not_disturb(DoNotDisturb::On);
        assert!(checker.evaluate(&cpu(90.0), start).is_empty());
        assert_eq!(checker.state("cpu-hot"), Some(ThresholdState::Armed));

        checker.set_do_not_disturb(DoNotDisturb::Until(SystemTime::now() - Duration::from_secs(1)));
        assert!(checker.evaluate(&cpu(50.0), start + Duration::from_secs(1)).is_empty());
        assert_eq!(checker.evaluate(&cpu(90.0), start + Duration::from_secs(2)).len(), 1);
    }

    #[test]
    fn test_replace_keeps_surviving_state() {
        let checker = checker();
        let start = Instant::now();
        checker.evaluate(&cpu(90.0), start);

        checker.replace_thresholds(vec![
            NotificationThreshold::new("cpu-hot", MetricFamily::Cpu, Comparison::GreaterThan, 85.0),
            NotificationThreshold::new("cpu-idle", MetricFamily::Cpu, Comparison::LessThan, 5.0).with_field("system"),
        ]);
        assert_eq!(checker.state("cpu-hot"), Some(ThresholdState::Fired { at: start }));
        assert_eq!(checker.state("cpu-idle"), Some(ThresholdState::Armed));

        let fired = checker.evaluate(&cpu(4.0), start + Duration::from_secs(1));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].threshold_id, "cpu-idle");
        assert_eq!(fired[0].field, "system");
    }

    #[test]
    fn test_disabled_and_other_families_are_ignored() {
        let mut disabled = NotificationThreshold::new("off", MetricFamily::Cpu, Comparison::GreaterThan, 10.0);
        disabled.enabled = false;
        let checker = ThresholdChecker::new(vec![
            disabled,
            NotificationThreshold::new("mem", MetricFamily::Memory, Comparison::GreaterThan, 10.0),
        ]);
        assert!(checker.evaluate(&cpu(99.0), Instant::now()).is_empty());
    }
}

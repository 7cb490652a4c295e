//! # Snapshot Store
//!
//! The single source of truth read by every widget: the latest reading per
//! metric family, the history buffers of each reading's series and the
//! health of each source.
//!
//! Only the scheduler writes to the store. Publication replaces a family's
//! `Arc<Snapshot>` under a write lock, so a reader sees either the previous
//! snapshot or the new one. Results carrying a tick older than the latest
//! one applied for their family are discarded.
//!
//! ## Example
//!
//! ```rust
//! use tonic_metrics::{prelude::*, store::{SnapshotStore, SourceStatus}};
//!
//! let store = SnapshotStore::new(60);
//! assert!(store.current(MetricFamily::Cpu).is_none());
//! assert_eq!(store.status(MetricFamily::Cpu), SourceStatus::Pending);
//! assert!(store.is_visible(MetricFamily::Battery));
//! ```

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::{sync::broadcast, time::Instant};
use tracing::{debug, trace, warn};

use crate::{
    core::metrics::{MetricFamily, MetricReading},
    error::{Error, SourceErrorKind},
    history::HistoryBuffer,
};

const EVENT_CAPACITY: usize = 256;

/// Latest reading of one family together with the tick that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub reading: MetricReading,
    /// Sequence number of the tick (or forced refresh) that produced it
    pub tick: u64,
    /// When the store accepted the reading
    pub observed_at: Instant,
}

/// Health of a family's source as seen by the widgets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// Nothing has been read yet
    Pending,
    /// The last read succeeded
    Fresh,
    /// The last read failed transiently; the previous reading is retained
    Degraded { kind: SourceErrorKind, message: String },
    /// The source needs a permission the user has not granted yet
    PermissionRequired,
    /// The hardware or service is absent; the widget hides itself
    Unavailable,
}

impl SourceStatus {
    fn from_error(err: &Error) -> Self {
        match err.kind() {
            SourceErrorKind::Unavailable => Self::Unavailable,
            SourceErrorKind::PermissionDenied => Self::PermissionRequired,
            kind => Self::Degraded { kind, message: err.to_string() },
        }
    }
}

/// Change notification for subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Published { family: MetricFamily, tick: u64 },
    StatusChanged { family: MetricFamily, status: SourceStatus },
}

/// Whether a write was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// A newer tick had already been applied for the family
    Discarded,
}

#[derive(Debug)]
struct FamilyState {
    snapshot: Option<Arc<Snapshot>>,
    latest_tick: Option<u64>,
    status: SourceStatus,
    primary: Option<&'static str>,
    series: HashMap<&'static str, HistoryBuffer>,
    capacity: usize,
}

impl FamilyState {
    fn new(capacity: usize) -> Self {
        Self {
            snapshot: None,
            latest_tick: None,
            status: SourceStatus::Pending,
            primary: None,
            series: HashMap::new(),
            capacity,
        }
    }

    fn is_stale(&self, tick: u64) -> bool {
        self.latest_tick.is_some_and(|latest| tick < latest)
    }
}

/// Latest snapshot, history and status per metric family
#[derive(Debug)]
pub struct SnapshotStore {
    families: RwLock<HashMap<MetricFamily, FamilyState>>,
    default_capacity: usize,
    events: broadcast::Sender<StoreEvent>,
}

impl SnapshotStore {
    /// Creates an empty store whose history buffers hold `history_capacity`
    /// samples until resized per family.
    pub fn new(history_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { families: RwLock::new(HashMap::new()), default_capacity: history_capacity.max(1), events }
    }

    /// Latest snapshot of `family`
    pub fn current(&self, family: MetricFamily) -> Option<Arc<Snapshot>> {
        self.families.read().get(&family).and_then(|state| state.snapshot.clone())
    }

    /// Latest reading of `family`
    pub fn reading(&self, family: MetricFamily) -> Option<MetricReading> {
        self.current(family).map(|snapshot| snapshot.reading.clone())
    }

    /// History of the primary series of `family`, most recent last
    pub fn history(&self, family: MetricFamily) -> Vec<f64> {
        let families = self.families.read();
        families
            .get(&family)
            .and_then(|state| state.primary.and_then(|name| state.series.get(name)))
            .map(HistoryBuffer::to_vec)
            .unwrap_or_default()
    }

    /// History of a named series of `family`, most recent last
    pub fn history_series(&self, family: MetricFamily, name: &str) -> Vec<f64> {
        let families = self.families.read();
        families
            .get(&family)
            .and_then(|state| state.series.get(name))
            .map(HistoryBuffer::to_vec)
            .unwrap_or_default()
    }

    pub fn history_capacity(&self, family: MetricFamily) -> usize {
        self.families.read().get(&family).map_or(self.default_capacity, |state| state.capacity)
    }

    pub fn status(&self, family: MetricFamily) -> SourceStatus {
        self.families.read().get(&family).map_or(SourceStatus::Pending, |state| state.status.clone())
    }

    /// Time since the current reading was published
    ///
    /// Keeps growing while the source fails, so the widget can show a stale
    /// indicator.
    pub fn reading_age(&self, family: MetricFamily) -> Option<Duration> {
        self.current(family).map(|snapshot| snapshot.observed_at.elapsed())
    }

    /// A widget hides itself once its source is permanently unavailable
    pub fn is_visible(&self, family: MetricFamily) -> bool {
        self.status(family) != SourceStatus::Unavailable
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Applies a successful reading produced by `tick`
    #[cfg(test)]
    pub(crate) fn publish(&self, tick: u64, reading: MetricReading) -> PublishOutcome {
        match self.publish_with(tick, reading, |_| ()) {
            Some(()) => PublishOutcome::Published,
            None => PublishOutcome::Discarded,
        }
    }

    /// Applies a reading and runs `applied` on it while the write lock is held
    ///
    /// `applied` only runs when the reading becomes the family's latest, and no
    /// other write to the store can land between the two. Returns `None` when
    /// the reading was discarded.
    pub(crate) fn publish_with<T>(
        &self,
        tick: u64,
        reading: MetricReading,
        applied: impl FnOnce(&MetricReading) -> T,
    ) -> Option<T> {
        let family = reading.family();
        let (status_changed, output) = {
            let mut families = self.families.write();
            let state = families.entry(family).or_insert_with(|| FamilyState::new(self.default_capacity));
            if state.is_stale(tick) {
                trace!(%family, tick, latest = ?state.latest_tick, "Discarding stale reading");
                return None;
            }

            let series = reading.series();
            state.primary = series.first().map(|(name, _)| *name);
            let capacity = state.capacity;
            for (name, value) in series {
                state.series.entry(name).or_insert_with(|| HistoryBuffer::new(capacity)).push(value);
            }
            let output = applied(&reading);
            state.snapshot = Some(Arc::new(Snapshot { reading, tick, observed_at: Instant::now() }));
            state.latest_tick = Some(tick);
            let changed = state.status != SourceStatus::Fresh;
            state.status = SourceStatus::Fresh;
            (changed, output)
        };

        debug!(%family, tick, "Published snapshot");
        if status_changed {
            self.emit(StoreEvent::StatusChanged { family, status: SourceStatus::Fresh });
        }
        self.emit(StoreEvent::Published { family, tick });
        Some(output)
    }

    /// Applies a failed read produced by `tick`
    ///
    /// The previous reading is retained unless the source is permanently
    /// unavailable.
    pub(crate) fn record_failure(&self, family: MetricFamily, tick: u64, err: &Error) -> PublishOutcome {
        let status = SourceStatus::from_error(err);
        let changed = {
            let mut families = self.families.write();
            let state = families.entry(family).or_insert_with(|| FamilyState::new(self.default_capacity));
            if state.is_stale(tick) {
                trace!(%family, tick, "Discarding stale failure");
                return PublishOutcome::Discarded;
            }
            if status == SourceStatus::Unavailable {
                state.snapshot = None;
            }
            state.latest_tick = Some(tick);
            let changed = state.status != status;
            state.status = status.clone();
            changed
        };

        warn!(%family, tick, kind = ?err.kind(), error = %err, "Source read failed");
        if changed {
            self.emit(StoreEvent::StatusChanged { family, status });
        }
        PublishOutcome::Published
    }

    /// Changes the history length of every series of `family`
    pub(crate) fn resize_history(&self, family: MetricFamily, capacity: usize) {
        let capacity = capacity.max(1);
        let mut families = self.families.write();
        let state = families.entry(family).or_insert_with(|| FamilyState::new(self.default_capacity));
        if state.capacity == capacity {
            return;
        }
        debug!(%family, from = state.capacity, to = capacity, "Resizing history");
        state.capacity = capacity;
        for buffer in state.series.values_mut() {
            buffer.resize(capacity);
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(crate::history::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{
        core::types::ByteSize,
        disk::DiskReading,
        memory::{MemoryReading, PressureLevel, SwapUsage},
    };

    fn disk(usage: f64) -> MetricReading {
        let total = 1_000u64;
        let used = (total as f64 * usage / 100.0) as u64;
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

    fn memory() -> MetricReading {
        MetricReading::Memory(MemoryReading {
            total: ByteSize::new(8 << 30),
            used: ByteSize::new(4 << 30),
            free: ByteSize::new(4 << 30),
            app: ByteSize::new(2 << 30),
            wired: ByteSize::new(1 << 30),
            compressed: ByteSize::new(1 << 30),
            pressure: PressureLevel::Normal,
            swap: SwapUsage { total: ByteSize::new(0), used: ByteSize::new(0) },
            captured_at: SystemTime::now(),
        })
    }

    #[test]
    fn test_publish_replaces_snapshot_and_records_history() {
        let store = SnapshotStore::new(3);
        for (tick, usage) in [(1, 10.0), (2, 20.0), (3, 30.0), (4, 40.0)] {
            assert_eq!(store.publish(tick, disk(usage)), PublishOutcome::Published);
        }

        let snapshot = store.current(MetricFamily::Disk).unwrap();
        assert_eq!(snapshot.tick, 4);
        assert_eq!(snapshot.reading.primary_value(), Some(40.0));
        assert_eq!(store.history(MetricFamily::Disk), vec![20.0, 30.0, 40.0]);
        assert_eq!(store.status(MetricFamily::Disk), SourceStatus::Fresh);
    }

    #[test]
    fn test_older_tick_is_discarded() {
        let store = SnapshotStore::new(10);
        store.publish(7, disk(70.0));
        assert_eq!(store.publish(6, disk(60.0)), PublishOutcome::Discarded);
        assert_eq!(store.current(MetricFamily::Disk).unwrap().tick, 7);
        assert_eq!(store.history(MetricFamily::Disk), vec![70.0]);

        let err = Error::timeout("late");
        assert_eq!(store.record_failure(MetricFamily::Disk, 5, &err), PublishOutcome::Discarded);
        assert_eq!(store.status(MetricFamily::Disk), SourceStatus::Fresh);
    }

    #[test]
    fn test_publish_with_runs_only_for_latest_reading() {
        let store = SnapshotStore::new(10);
        assert_eq!(store.publish_with(5, disk(90.0), |r| r.primary_value()), Some(Some(90.0)));

        let mut ran = false;
        assert_eq!(store.publish_with(4, disk(95.0), |_| ran = true), None);
        assert!(!ran);
        assert_eq!(store.reading(MetricFamily::Disk).unwrap().primary_value(), Some(90.0));
    }

    #[test]
    fn test_ticks_are_ordered_per_family() {
        let store = SnapshotStore::new(10);
        store.publish(9, disk(50.0));
        assert_eq!(store.publish(3, memory()), PublishOutcome::Published);
    }

    #[test]
    fn test_transient_failure_keeps_reading() {
        let store = SnapshotStore::new(10);
        store.publish(4, disk(62.0));
        store.record_failure(MetricFamily::Disk, 5, &Error::permission_denied("Full Disk Access"));

        assert_eq!(store.reading(MetricFamily::Disk).unwrap().primary_value(), Some(62.0));
        assert_eq!(store.status(MetricFamily::Disk), SourceStatus::PermissionRequired);
        assert!(store.is_visible(MetricFamily::Disk));

        store.record_failure(MetricFamily::Disk, 6, &Error::invalid_data("garbage"));
        assert!(matches!(
            store.status(MetricFamily::Disk),
            SourceStatus::Degraded { kind: SourceErrorKind::InvalidData, .. }
        ));
        assert_eq!(store.history(MetricFamily::Disk), vec![62.0]);
    }

    #[test]
    fn test_unavailable_hides_widget() {
        let store = SnapshotStore::new(10);
        store.record_failure(MetricFamily::Battery, 1, &Error::unavailable("no battery"));
        assert!(!store.is_visible(MetricFamily::Battery));
        assert!(store.current(MetricFamily::Battery).is_none());
        assert!(store.reading_age(MetricFamily::Battery).is_none());
    }

    #[test]
    fn test_resize_history_applies_to_all_series() {
        let store = SnapshotStore::new(10);
        for tick in 1..=6 {
            store.publish(tick, memory());
        }
        store.resize_history(MetricFamily::Memory, 2);
        assert_eq!(store.history_capacity(MetricFamily::Memory), 2);
        assert_eq!(store.history(MetricFamily::Memory).len(), 2);
        assert_eq!(store.history_series(MetricFamily::Memory, "app_gb").len(), 2);
        assert!(store.history_series(MetricFamily::Memory, "nope").is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_status_and_publish_events() {
        let store = SnapshotStore::new(10);
        let mut events = store.subscribe();
        store.publish(1, disk(5.0));

        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::StatusChanged { family: MetricFamily::Disk, status: SourceStatus::Fresh }
        );
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Published { family: MetricFamily::Disk, tick: 1 });

        store.publish(2, disk(6.0));
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Published { family: MetricFamily::Disk, tick: 2 });
    }
}

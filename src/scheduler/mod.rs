//! # Scheduler Module
//!
//! One periodic driver for every metric source. Each tick polls the sources
//! that are due, bounds each call with a timeout, joins the results and
//! publishes them into the [`SnapshotStore`]. Fresh readings are then checked
//! against the notification thresholds.
//!
//! A source is due on tick `n` when `n % ceil(preferred / base) == 0`, so a
//! source preferring 10 s on a 1 s base interval is polled every tenth tick.
//!
//! The lifecycle is `Idle → Running ⇄ Suspended → Stopped`, driven through the
//! [`SchedulerHandle`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tonic_metrics::{cpu::CpuSource, platform, scheduler::Scheduler, store::SnapshotStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(SnapshotStore::default());
//!     let (handle, task) = Scheduler::new(Arc::clone(&store))
//!         .with_source(Arc::new(CpuSource::new(platform::native())))
//!         .spawn();
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(3)).await;
//!     println!("{:?}", store.history(tonic_metrics::prelude::MetricFamily::Cpu));
//!
//!     handle.stop().await;
//!     task.await.ok();
//! }
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    core::metrics::{MetricFamily, MetricReading},
    error::{Error, Result},
    notification::{self, LogNotifier, Notifier, ThresholdChecker},
    store::{SnapshotStore, SourceStatus},
    traits::MetricSource,
};


/// Shortest accepted base interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
/// Longest accepted base interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on a single adapter call
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(5);

/// Checks that `interval` is within `MIN_INTERVAL..=MAX_INTERVAL`
pub fn validate_interval(interval: Duration) -> Result<Duration> {
    if (MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
        Ok(interval)
    } else {
        Err(Error::invalid_config(format!(
            "refresh interval must be between {}s and {}s, got {:?}",
            MIN_INTERVAL.as_secs(),
            MAX_INTERVAL.as_secs(),
            interval
        )))
    }
}

/// Lifecycle of the scheduler task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Suspended,
    Stopped,
}

/// Runtime settings of one family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySettings {
    pub enabled: bool,
    /// Replaces the source's preferred interval
    pub interval: Option<Duration>,
}

impl Default for FamilySettings {
    fn default() -> Self {
        Self { enabled: true, interval: None }
    }
}

#[derive(Debug)]
enum Command {
    Suspend,
    Resume,
    SetInterval(Duration),
    Stop,
}

struct Shared {
    sources: BTreeMap<MetricFamily, Arc<dyn MetricSource>>,
    store: Arc<SnapshotStore>,
    checker: Arc<ThresholdChecker>,
    notifier: Arc<dyn Notifier>,
    settings: RwLock<HashMap<MetricFamily, FamilySettings>>,
    interval: Mutex<Duration>,
    adapter_timeout: Duration,
    sequence: AtomicU64,
    ticks: AtomicU64,
    adapter_calls: AtomicU64,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("families", &self.sources.keys().collect::<Vec<_>>())
            .field("interval", &*self.interval.lock())
            .field("adapter_timeout", &self.adapter_timeout)
            .field("ticks", &self.ticks.load(Ordering::Relaxed))
            .field("adapter_calls", &self.adapter_calls.load(Ordering::Relaxed))
            .finish()
    }
}

impl Shared {
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn due_sources(&self, n: u64, base: Duration) -> Vec<Arc<dyn MetricSource>> {
        let settings = self.settings.read();
        self.sources
            .iter()
            .filter_map(|(family, source)| {
                let family_settings = settings.get(family).copied().unwrap_or_default();
                if !family_settings.enabled || self.store.status(*family) == SourceStatus::Unavailable {
                    return None;
                }
                let preferred = family_settings.interval.unwrap_or_else(|| source.preferred_interval());
                (n % stride(preferred, base) == 0).then(|| Arc::clone(source))
            })
            .collect()
    }

    #[instrument(skip(self, base))]
    async fn tick(&self, n: u64, base: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let due = self.due_sources(n, base);
        if due.is_empty() {
            trace!("No source due");
            return;
        }
        let sequence = self.next_sequence();
        self.poll(sequence, due).await;
    }

    #[instrument(skip(self))]
    async fn refresh(&self, family: MetricFamily) -> Result<()> {
        let source = self
            .sources
            .get(&family)
            .cloned()
            .ok_or_else(|| Error::unavailable(format!("no source registered for {}", family)))?;
        let sequence = self.next_sequence();
        self.poll(sequence, vec![source]).await;
        Ok(())
    }

    async fn poll(&self, sequence: u64, sources: Vec<Arc<dyn MetricSource>>) {
        let reads = sources.into_iter().map(|source| {
            self.adapter_calls.fetch_add(1, Ordering::Relaxed);
            read_bounded(source, self.adapter_timeout)
        });

        for (family, result) in join_all(reads).await {
            match result {
                Ok(reading) => {
                    let now = Instant::now();
                    let fired = self.store.publish_with(sequence, reading, |latest| self.checker.evaluate(latest, now));
                    for notification in fired.into_iter().flatten() {
                        notification::dispatch(&self.notifier, notification);
                    }
                },
                Err(err) => {
                    self.store.record_failure(family, sequence, &err);
                },
            }
        }
    }
}

/// Number of base ticks between two polls of a source
fn stride(preferred: Duration, base: Duration) -> u64 {
    let base = base.as_millis().max(1);
    preferred.as_millis().div_ceil(base).max(1) as u64
}

/// Runs one adapter call on its own task, bounded by `limit`
///
/// A call that overruns is reported as a timeout but not aborted; its
/// result is dropped when it eventually completes.
async fn read_bounded(source: Arc<dyn MetricSource>, limit: Duration) -> (MetricFamily, Result<MetricReading>) {
    let family = source.family();
    let started = Instant::now();
    let task = tokio::spawn(async move { source.read().await });
    let result = match time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::system(format!("{} source task failed: {}", family, join_err))),
        Err(_) => {
            warn!(%family, ?limit, "Source read timed out");
            Err(Error::timeout(format!("{} read exceeded {:?}", family, limit)))
        },
    };
    debug!(%family, elapsed = ?started.elapsed(), ok = result.is_ok(), "Source read finished");
    (family, result)
}

async fn run(shared: Arc<Shared>, mut commands: mpsc::UnboundedReceiver<Command>, state: watch::Sender<SchedulerState>) {
    let mut period = *shared.interval.lock();
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut current = SchedulerState::Running;
    let mut n: u64 = 0;
    let mut last_tick = Instant::now();
    state.send_replace(current);
    info!(?period, families = shared.sources.len(), "Scheduler started");

    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(Command::Suspend) => {
                    if current == SchedulerState::Running {
                        current = SchedulerState::Suspended;
                        state.send_replace(current);
                        info!("Scheduler suspended");
                    }
                },
                Some(Command::Resume) => {
                    if current == SchedulerState::Suspended {
                        current = SchedulerState::Running;
                        state.send_replace(current);
                        info!("Scheduler resumed");
                        last_tick = Instant::now();
                        shared.tick(n, period).await;
                        n += 1;
                        ticker.reset();
                    }
                },
                Some(Command::SetInterval(interval)) => {
                    if interval != period {
                        info!(from = ?period, to = ?interval, "Refresh interval changed");
                        period = interval;
                        ticker = time::interval_at(last_tick + period, period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    }
                },
                Some(Command::Stop) | None => break,
            },
            _ = ticker.tick(), if current == SchedulerState::Running => {
                last_tick = Instant::now();
                shared.tick(n, period).await;
                n += 1;
            }
        }
    }

    state.send_replace(SchedulerState::Stopped);
    info!(
        ticks = shared.ticks.load(Ordering::Relaxed),
        adapter_calls = shared.adapter_calls.load(Ordering::Relaxed),
        "Scheduler stopped"
    );
}

/// Builder for the refresh scheduler
pub struct Scheduler {
    sources: BTreeMap<MetricFamily, Arc<dyn MetricSource>>,
    store: Arc<SnapshotStore>,
    checker: Arc<ThresholdChecker>,
    notifier: Arc<dyn Notifier>,
    settings: HashMap<MetricFamily, FamilySettings>,
    interval: Duration,
    adapter_timeout: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self {
            sources: BTreeMap::new(),
            store,
            checker: Arc::new(ThresholdChecker::default()),
            notifier: Arc::new(LogNotifier),
            settings: HashMap::new(),
            interval: DEFAULT_INTERVAL,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    /// Registers a source, replacing any earlier source of the same family
    pub fn with_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.sources.insert(source.family(), source);
        self
    }

    /// Base interval, clamped to `MIN_INTERVAL..=MAX_INTERVAL`
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        self
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn with_checker(mut self, checker: Arc<ThresholdChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_family_settings(mut self, family: MetricFamily, settings: FamilySettings) -> Self {
        self.settings.insert(family, settings);
        self
    }

    /// Starts the scheduler task. The first tick runs immediately.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let shared = Arc::new(Shared {
            sources: self.sources,
            store: self.store,
            checker: self.checker,
            notifier: self.notifier,
            settings: RwLock::new(self.settings),
            interval: Mutex::new(self.interval),
            adapter_timeout: self.adapter_timeout,
            sequence: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            adapter_calls: AtomicU64::new(0),
        });
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let task = tokio::spawn(run(Arc::clone(&shared), commands_rx, state_tx));
        (SchedulerHandle { shared, commands: commands_tx, state: state_rx }, task)
    }
}

/// Control surface of a running scheduler
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Stops ticking until [`resume`](Self::resume); no adapter is called
    /// in between except through [`force_refresh`](Self::force_refresh).
    pub fn suspend(&self) -> Result<()> {
        self.send(Command::Suspend)
    }

    /// Resumes ticking, starting with an immediate tick
    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    /// Changes the base interval
    ///
    /// The next tick fires one new period after the previous tick.
    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        let interval = validate_interval(interval)?;
        self.send(Command::SetInterval(interval))?;
        *self.shared.interval.lock() = interval;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        *self.shared.interval.lock()
    }

    /// Applies per-family settings from the next tick on
    pub fn configure(&self, family: MetricFamily, settings: FamilySettings) {
        debug!(%family, ?settings, "Family settings changed");
        self.shared.settings.write().insert(family, settings);
    }

    pub fn family_settings(&self, family: MetricFamily) -> FamilySettings {
        self.shared.settings.read().get(&family).copied().unwrap_or_default()
    }

    /// Polls `family` out of cycle, e.g. when its popover opens
    ///
    /// This is also the only way a source that reported itself unavailable
    /// gets polled again.
    pub async fn force_refresh(&self, family: MetricFamily) -> Result<()> {
        if self.state() == SchedulerState::Stopped {
            return Err(Error::SchedulerStopped);
        }
        self.shared.refresh(family).await
    }

    /// Stops scheduling new ticks and waits for the current one to finish
    pub async fn stop(&self) {
        if self.commands.send(Command::Stop).is_err() {
            return;
        }
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == SchedulerState::Stopped).await;
    }

    /// Ticks run so far, including the immediate tick on resume
    pub fn ticks_run(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// Adapter calls issued so far
    pub fn adapter_calls(&self) -> u64 {
        self.shared.adapter_calls.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.shared.store
    }

    pub fn checker(&self) -> &Arc<ThresholdChecker> {
        &self.shared.checker
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::SchedulerStopped)
    }
}

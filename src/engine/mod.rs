//! # Engine Module
//!
//! The explicitly constructed core of the menu-bar app. An [`Engine`] owns the
//! snapshot store, the preferences store, the threshold checker and the
//! refresh scheduler, and keeps them consistent: preference changes are
//! applied to the running scheduler as they happen.
//!
//! There is no global instance. The UI layer builds one engine at launch,
//! reads snapshots from it and reports lifecycle events back to it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tonic_metrics::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::builder().preferences_path("/tmp/tonic/preferences.json").build();
//!
//!     engine.popover_opened(MetricFamily::Disk).await.ok();
//!     if let Some(snapshot) = engine.current_snapshot(MetricFamily::Disk) {
//!         println!("{:?}", snapshot.reading);
//!     }
//!
//!     engine.shutdown().await;
//! }
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    battery::BatterySource,
    bluetooth::BluetoothSource,
    config::{ConfigChange, Preferences, PreferencesStore, WidgetConfiguration},
    core::metrics::{MetricFamily, MetricReading},
    cpu::CpuSource,
    disk::DiskSource,
    error::Result,
    gpu::GpuSource,
    helper::HelperClient,
    memory::MemorySource,
    network::{NetworkSource, PublicIpLookup},
    notification::{LogNotifier, Notifier, ThresholdChecker},
    platform::{self, SystemProbe},
    scheduler::{Scheduler, SchedulerHandle, DEFAULT_ADAPTER_TIMEOUT},
    sensors::SensorsSource,
    store::{Snapshot, SnapshotStore, SourceStatus, StoreEvent},
    traits::MetricSource,
};


/// Builder for an [`Engine`]
#[derive(Default)]
pub struct EngineBuilder {
    probe: Option<Arc<dyn SystemProbe>>,
    sources: Vec<Arc<dyn MetricSource>>,
    preferences: Option<Arc<PreferencesStore>>,
    preferences_path: Option<PathBuf>,
    notifier: Option<Arc<dyn Notifier>>,
    helper: Option<HelperClient>,
    public_ip: Option<Arc<dyn PublicIpLookup>>,
    adapter_timeout: Option<Duration>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe the default sources read from; [`platform::native`] otherwise
    pub fn probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Registers a source. Once any source is registered the default set
    /// is not built.
    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = Arc<dyn MetricSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Loads and persists preferences at `path`
    pub fn preferences_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferences_path = Some(path.into());
        self
    }

    /// Uses an already opened preferences store
    pub fn preferences(mut self, preferences: Arc<PreferencesStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn helper(mut self, helper: HelperClient) -> Self {
        self.helper = Some(helper);
        self
    }

    /// Public address lookup for the default network source
    pub fn public_ip_lookup(mut self, lookup: Arc<dyn PublicIpLookup>) -> Self {
        self.public_ip = Some(lookup);
        self
    }

    pub fn adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = Some(timeout);
        self
    }

    /// Wires everything together and starts the scheduler
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Engine {
        let preferences = match (self.preferences, self.preferences_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(PreferencesStore::open(path)),
            (None, None) => Arc::new(PreferencesStore::in_memory()),
        };
        let prefs = preferences.snapshot();

        let sources = if self.sources.is_empty() {
            let probe = self.probe.unwrap_or_else(platform::native);
            default_sources(probe, self.public_ip)
        } else {
            self.sources
        };

        let store = Arc::new(SnapshotStore::default());
        let checker = Arc::new(ThresholdChecker::new(prefs.thresholds()));
        checker.set_do_not_disturb(prefs.do_not_disturb);

        let mut scheduler = Scheduler::new(Arc::clone(&store))
            .with_interval(prefs.refresh_interval())
            .with_adapter_timeout(self.adapter_timeout.unwrap_or(DEFAULT_ADAPTER_TIMEOUT))
            .with_checker(Arc::clone(&checker))
            .with_notifier(self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)));
        for widget in &prefs.widgets {
            store.resize_history(widget.family, widget.history_length);
            scheduler = scheduler.with_family_settings(widget.family, widget.scheduler_settings());
        }
        for source in sources {
            scheduler = scheduler.with_source(source);
        }

        let (scheduler, scheduler_task) = scheduler.spawn();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watcher = PreferenceWatcher {
            preferences: Arc::clone(&preferences),
            scheduler: scheduler.clone(),
            store: Arc::clone(&store),
            checker,
        };
        let watcher_task = tokio::spawn(watcher.run(preferences.subscribe(), shutdown_rx));

        info!(
            interval = ?prefs.refresh_interval(),
            widgets = prefs.widgets.len(),
            "Engine started"
        );

        Engine {
            store,
            preferences,
            scheduler,
            helper: self.helper,
            shutdown: shutdown_tx,
            tasks: vec![("scheduler", scheduler_task), ("preference-watcher", watcher_task)],
        }
    }
}

fn default_sources(
    probe: Arc<dyn SystemProbe>,
    public_ip: Option<Arc<dyn PublicIpLookup>>,
) -> Vec<Arc<dyn MetricSource>> {
    let mut network = NetworkSource::new(Arc::clone(&probe));
    if let Some(lookup) = public_ip.or_else(default_public_ip) {
        network = network.with_public_ip(lookup);
    }

    let sources: Vec<Arc<dyn MetricSource>> = vec![
        Arc::new(CpuSource::new(Arc::clone(&probe))),
        Arc::new(MemorySource::new(Arc::clone(&probe))),
        Arc::new(DiskSource::new(Arc::clone(&probe))),
        Arc::new(network),
        Arc::new(GpuSource::new(Arc::clone(&probe))),
        Arc::new(BatterySource::new(Arc::clone(&probe))),
        Arc::new(SensorsSource::new(Arc::clone(&probe))),
        Arc::new(BluetoothSource::new(probe)),
    ];
    sources
}

#[cfg(feature = "public-ip")]
fn default_public_ip() -> Option<Arc<dyn PublicIpLookup>> {
    match crate::network::IpifyLookup::new() {
        Ok(lookup) => Some(Arc::new(lookup)),
        Err(err) => {
            warn!(error = %err, "Public IP lookup disabled");
            None
        },
    }
}

#[cfg(not(feature = "public-ip"))]
fn default_public_ip() -> Option<Arc<dyn PublicIpLookup>> {
    None
}

/// The running telemetry core
#[derive(Debug)]
pub struct Engine {
    store: Arc<SnapshotStore>,
    preferences: Arc<PreferencesStore>,
    scheduler: SchedulerHandle,
    helper: Option<HelperClient>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Latest snapshot of `family`, if one has been published
    pub fn current_snapshot(&self, family: MetricFamily) -> Option<Arc<Snapshot>> {
        self.store.current(family)
    }

    pub fn reading(&self, family: MetricFamily) -> Option<MetricReading> {
        self.store.reading(family)
    }

    /// Primary series history of `family`, oldest first
    pub fn history(&self, family: MetricFamily) -> Vec<f64> {
        self.store.history(family)
    }

    pub fn status(&self, family: MetricFamily) -> SourceStatus {
        self.store.status(family)
    }

    pub fn reading_age(&self, family: MetricFamily) -> Option<Duration> {
        self.store.reading_age(family)
    }

    /// Whether the menu bar should show `family`: enabled in preferences and
    /// backed by a source that has not reported itself unavailable
    pub fn is_visible(&self, family: MetricFamily) -> bool {
        self.preferences.widget(family).enabled && self.store.is_visible(family)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn preferences(&self) -> &Arc<PreferencesStore> {
        &self.preferences
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub fn helper(&self) -> Option<&HelperClient> {
        self.helper.as_ref()
    }

    /// The app went to the background or the menu bar is hidden
    pub fn enter_background(&self) -> Result<()> {
        debug!("Entering background");
        self.scheduler.suspend()
    }

    /// The app is visible again; refreshes everything at once
    pub fn enter_foreground(&self) -> Result<()> {
        debug!("Entering foreground");
        self.scheduler.resume()
    }

    /// Refreshes `family` out of cycle so its popover opens on fresh data
    pub async fn popover_opened(&self, family: MetricFamily) -> Result<()> {
        self.scheduler.force_refresh(family).await
    }

    /// Stops the scheduler and the preference watcher and waits for both
    pub async fn shutdown(self) {
        self.scheduler.stop().await;
        let _ = self.shutdown.send(true);

        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(()) => debug!(task = name, "Task shut down"),
                Err(err) => error!(task = name, error = %err, "Task failed during shutdown"),
            }
        }
        info!("Engine stopped");
    }
}

/// Applies preference changes to the running components
struct PreferenceWatcher {
    preferences: Arc<PreferencesStore>,
    scheduler: SchedulerHandle,
    store: Arc<SnapshotStore>,
    checker: Arc<ThresholdChecker>,
}

impl PreferenceWatcher {
    async fn run(self, mut changes: broadcast::Receiver<ConfigChange>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                change = changes.recv() => match change {
                    Ok(change) => self.apply(change),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Preference watcher lagged; reapplying everything");
                        self.apply_all(&self.preferences.snapshot());
                    },
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("Preference watcher stopped");
    }

    fn apply(&self, change: ConfigChange) {
        debug!(?change, "Applying preference change");
        match change {
            ConfigChange::Widget(family) => {
                self.apply_widget(&self.preferences.widget(family));
                self.checker.replace_thresholds(self.preferences.snapshot().thresholds());
            },
            ConfigChange::RefreshInterval(interval) => self.set_interval(interval),
            ConfigChange::DoNotDisturb(dnd) => self.checker.set_do_not_disturb(dnd),
            ConfigChange::Reset => self.apply_all(&self.preferences.snapshot()),
        }
    }

    fn apply_all(&self, prefs: &Preferences) {
        self.set_interval(prefs.refresh_interval());
        for widget in &prefs.widgets {
            self.apply_widget(widget);
        }
        self.checker.replace_thresholds(prefs.thresholds());
        self.checker.set_do_not_disturb(prefs.do_not_disturb);
    }

    fn apply_widget(&self, widget: &WidgetConfiguration) {
        self.scheduler.configure(widget.family, widget.scheduler_settings());
        self.store.resize_history(widget.family, widget.history_length);
    }

    fn set_interval(&self, interval: Duration) {
        if self.scheduler.interval() == interval {
            return;
        }
        if let Err(err) = self.scheduler.set_interval(interval) {
            warn!(error = %err, "Could not apply refresh interval");
        }
    }
}

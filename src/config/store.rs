use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{migrate::migrate, Preferences, WidgetConfiguration, SCHEMA_VERSION};
use crate::{
    core::metrics::MetricFamily,
    error::{Error, Result},
    notification::DoNotDisturb,
    scheduler,
};

const CHANGE_CAPACITY: usize = 64;

/// What changed in the preferences
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    Widget(MetricFamily),
    RefreshInterval(Duration),
    DoNotDisturb(DoNotDisturb),
    Reset,
}

/// Persisted user preferences
///
/// Every mutation is validated, written through to disk and announced to
/// subscribers. Write failures are logged and otherwise ignored: the
/// in-memory preferences stay authoritative for the session.
#[derive(Debug)]
pub struct PreferencesStore {
    path: Option<PathBuf>,
    current: RwLock<Preferences>,
    save_lock: Mutex<()>,
    changes: broadcast::Sender<ConfigChange>,
}

impl PreferencesStore {
    /// Preferences that are never written anywhere
    pub fn in_memory() -> Self {
        Self::with_preferences(None, Preferences::default())
    }

    /// Loads preferences from `path`, upgrading older schema versions
    ///
    /// A missing file yields the defaults. A file that cannot be read or
    /// parsed is moved aside to `<name>.corrupt` and the defaults are used.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (preferences, needs_save) = load(&path);
        let store = Self::with_preferences(Some(path), preferences);
        if needs_save {
            store.save();
        }
        store
    }

    fn with_preferences(path: Option<PathBuf>, preferences: Preferences) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { path, current: RwLock::new(preferences), save_lock: Mutex::new(()), changes }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current preferences
    pub fn snapshot(&self) -> Preferences {
        self.current.read().clone()
    }

    pub fn widget(&self, family: MetricFamily) -> WidgetConfiguration {
        self.current.read().widget(family).cloned().unwrap_or_else(|| WidgetConfiguration::new(family))
    }

    pub fn refresh_interval(&self) -> Duration {
        self.current.read().refresh_interval()
    }

    pub fn do_not_disturb(&self) -> DoNotDisturb {
        self.current.read().do_not_disturb
    }

    pub fn update_widget(&self, widget: WidgetConfiguration) -> Result<()> {
        widget.validate()?;
        let family = widget.family;
        {
            let mut current = self.current.write();
            match current.widgets.iter_mut().find(|w| w.family == family) {
                Some(slot) => *slot = widget,
                None => current.widgets.push(widget),
            }
        }
        self.save();
        self.announce(ConfigChange::Widget(family));
        Ok(())
    }

    pub fn set_refresh_interval(&self, interval: Duration) -> Result<()> {
        let interval = scheduler::validate_interval(interval)?;
        if interval.subsec_nanos() != 0 {
            return Err(Error::invalid_config("refresh interval must be whole seconds"));
        }
        self.current.write().refresh_interval_secs = interval.as_secs();
        self.save();
        self.announce(ConfigChange::RefreshInterval(interval));
        Ok(())
    }

    pub fn set_do_not_disturb(&self, dnd: DoNotDisturb) {
        self.current.write().do_not_disturb = dnd;
        self.save();
        self.announce(ConfigChange::DoNotDisturb(dnd));
    }

    pub fn reset_to_defaults(&self) {
        *self.current.write() = Preferences::default();
        info!("Preferences reset to defaults");
        self.save();
        self.announce(ConfigChange::Reset);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.changes.subscribe()
    }

    fn announce(&self, change: ConfigChange) {
        debug!(?change, "Preferences changed");
        let _ = self.changes.send(change);
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let _guard = self.save_lock.lock();
        let preferences = self.current.read().clone();
        if let Err(err) = write_atomically(path, &preferences) {
            warn!(path = %path.display(), error = %err, "Failed to save preferences");
        }
    }
}

/// Returns the preferences and whether they should be written back
fn load(path: &Path) -> (Preferences, bool) {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No preferences file, using defaults");
            return (Preferences::default(), false);
        },
        Err(err) => {
            quarantine(path, &err.into());
            return (Preferences::default(), true);
        },
    };

    match serde_json::from_str(&contents).map_err(Error::from).and_then(migrate) {
        Ok((preferences, found)) => {
            debug!(path = %path.display(), version = found, "Loaded preferences");
            (preferences, found != SCHEMA_VERSION)
        },
        Err(err) => {
            quarantine(path, &err);
            (Preferences::default(), true)
        },
    }
}

fn quarantine(path: &Path, err: &Error) {
    let aside = sibling(path, "corrupt");
    warn!(path = %path.display(), error = %err, "Unreadable preferences, moving aside and using defaults");
    if let Err(err) = fs::rename(path, &aside) {
        warn!(path = %aside.display(), error = %err, "Failed to move corrupt preferences aside");
    }
}

fn write_atomically(path: &Path, preferences: &Preferences) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let temp = sibling(path, "tmp");
    let json = serde_json::to_vec_pretty(preferences)?;
    fs::write(&temp, json)?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// `prefs.json` → `prefs.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

use std::{fs, time::Duration};

use tempfile::tempdir;

use crate::{
    config::{ConfigChange, Preferences, PreferencesStore, Visualization, WidgetConfiguration, SCHEMA_VERSION},
    core::metrics::MetricFamily,
    error::Error,
    notification::{Comparison, DoNotDisturb, NotificationThreshold},
};

#[test]
fn test_missing_file_yields_defaults_without_writing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    let store = PreferencesStore::open(&path);

    assert_eq!(store.snapshot(), Preferences::default());
    assert!(!path.exists());
}

#[test]
fn test_updates_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    {
        let store = PreferencesStore::open(&path);
        let mut disk = store.widget(MetricFamily::Disk);
        disk.visualization = Visualization::Pie;
        disk.accent_color = Some("#34c759".into());
        disk.update_interval_secs = Some(30);
        disk.thresholds.push(NotificationThreshold::new(
            "disk-full",
            MetricFamily::Disk,
            Comparison::GreaterThanOrEqual,
            90.0,
        ));
        store.update_widget(disk).unwrap();
        store.set_refresh_interval(Duration::from_secs(2)).unwrap();
    }

    let reopened = PreferencesStore::open(&path);
    let disk = reopened.widget(MetricFamily::Disk);
    assert_eq!(disk.visualization, Visualization::Pie);
    assert_eq!(disk.update_interval(), Some(Duration::from_secs(30)));
    assert_eq!(disk.thresholds[0].id, "disk-full");
    assert_eq!(reopened.refresh_interval(), Duration::from_secs(2));
    assert!(!dir.path().join("preferences.json.tmp").exists());
}

#[test]
fn test_v1_file_is_migrated_and_rewritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    fs::write(&path, r#"{"update_interval": 5, "gpu_state": false, "memory_widget": "barChart"}"#).unwrap();

    let store = PreferencesStore::open(&path);
    assert_eq!(store.refresh_interval(), Duration::from_secs(5));
    assert!(!store.widget(MetricFamily::Gpu).enabled);
    assert_eq!(store.widget(MetricFamily::Memory).visualization, Visualization::BarChart);

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["schema_version"], SCHEMA_VERSION);
}

#[test]
fn test_corrupt_file_is_moved_aside() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    fs::write(&path, "{ not json").unwrap();

    let store = PreferencesStore::open(&path);
    assert_eq!(store.snapshot(), Preferences::default());
    assert_eq!(fs::read_to_string(dir.path().join("preferences.json.corrupt")).unwrap(), "{ not json");
    // defaults were written in place of the corrupt file
    assert!(path.exists());
}

#[test]
fn test_invalid_updates_are_rejected() {
    let store = PreferencesStore::in_memory();
    let mut cpu = store.widget(MetricFamily::Cpu);
    cpu.update_interval_secs = Some(0);
    assert!(matches!(store.update_widget(cpu.clone()), Err(Error::InvalidConfig(_))));

    cpu.update_interval_secs = Some(61);
    assert!(store.update_widget(cpu.clone()).is_err());

    cpu.update_interval_secs = None;
    cpu.history_length = 5;
    assert!(store.update_widget(cpu.clone()).is_err());

    cpu.history_length = 1000;
    cpu.accent_color = Some("orange".into());
    assert!(store.update_widget(cpu.clone()).is_err());

    cpu.accent_color = None;
    cpu.thresholds.push(NotificationThreshold::new("x", MetricFamily::Memory, Comparison::GreaterThan, 1.0));
    assert!(store.update_widget(cpu).is_err());

    assert!(store.set_refresh_interval(Duration::from_millis(1_500)).is_err());
    assert_eq!(store.snapshot(), Preferences::default());
}

#[test]
fn test_unwritable_location_is_not_fatal() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    // parent is a regular file, so every save fails
    let store = PreferencesStore::open(blocker.join("preferences.json"));

    let mut cpu = store.widget(MetricFamily::Cpu);
    cpu.enabled = false;
    store.update_widget(cpu).unwrap();
    assert!(!store.widget(MetricFamily::Cpu).enabled);
}

#[tokio::test]
async fn test_subscribers_see_each_change() {
    let store = PreferencesStore::in_memory();
    let mut changes = store.subscribe();

    store.update_widget(WidgetConfiguration::new(MetricFamily::Network)).unwrap();
    store.set_do_not_disturb(DoNotDisturb::On);
    store.reset_to_defaults();

    assert_eq!(changes.recv().await.unwrap(), ConfigChange::Widget(MetricFamily::Network));
    assert_eq!(changes.recv().await.unwrap(), ConfigChange::DoNotDisturb(DoNotDisturb::On));
    assert_eq!(changes.recv().await.unwrap(), ConfigChange::Reset);
    assert_eq!(store.do_not_disturb(), DoNotDisturb::Off);
}

#![allow(dead_code)]

pub mod notifier;
pub mod sources;

use std::sync::Arc;

use tonic_metrics::{config::PreferencesStore, prelude::*};

pub use notifier::RecordingNotifier;
pub use sources::{cpu_reading, disk_reading, ScriptedSource, Step};

/// Engine over the given sources with in-memory preferences
pub fn engine(
    preferences: PreferencesStore,
    sources: Vec<Arc<ScriptedSource>>,
    notifier: Arc<RecordingNotifier>,
) -> Engine {
    Engine::builder()
        .preferences(Arc::new(preferences))
        .sources(sources.into_iter().map(|s| s as Arc<dyn MetricSource>))
        .notifier(notifier)
        .build()
}

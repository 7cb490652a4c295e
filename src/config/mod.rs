//! # Config Module
//!
//! User preferences: the refresh interval, do-not-disturb and one
//! [`WidgetConfiguration`] per metric family, persisted as a JSON document.
//! Older documents are upgraded on load.
//!
//! ## Example
//!
//! ```rust
//! use tonic_metrics::{config::{PreferencesStore, Visualization}, prelude::*};
//!
//! let store = PreferencesStore::in_memory();
//! let mut cpu = store.widget(MetricFamily::Cpu);
//! cpu.visualization = Visualization::LineChart;
//! cpu.history_length = 180;
//! store.update_widget(cpu).unwrap();
//!
//! assert_eq!(store.widget(MetricFamily::Cpu).history_length, 180);
//! ```

mod migrate;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use store::{ConfigChange, PreferencesStore};
pub use types::*;

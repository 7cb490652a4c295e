//! Tonic Metrics - the telemetry core of a macOS menu-bar monitor
//!
//! This crate samples system metrics, keeps a short history of each, decides
//! when the user should be notified and persists the user's widget
//! preferences. Rendering is left to the UI layer, which reads snapshots from
//! an [`Engine`](engine::Engine) and tells it when the app moves between
//! foreground and background.
//!
//! # Features
//!
//! - **CPU**: user/system/idle split, per-core load, frequency and load average
//! - **Memory**: used, wired, compressed and swap, plus memory pressure
//! - **Disk**: capacity of a mount point and read/write throughput
//! - **Network**: per-interface throughput, totals and the public address
//! - **GPU**: utilization and memory of each GPU
//! - **Battery**: charge, health, cycle count and time remaining
//! - **Sensors**: SMC temperatures and fan speeds
//! - **Bluetooth**: connected devices and their battery levels
//!
//! Every family implements [`MetricSource`](traits::MetricSource). A single
//! [`Scheduler`](scheduler::Scheduler) polls them all, stores results in a
//! [`SnapshotStore`](store::SnapshotStore) and checks notification thresholds.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tonic_metrics::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     tonic_metrics::logging::init(tonic_metrics::logging::DEFAULT_DIRECTIVE);
//!
//!     let engine = Engine::builder().build();
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!
//!     for family in MetricFamily::ALL {
//!         println!("{}: {:?}", family, engine.history(family));
//!     }
//!     engine.shutdown().await;
//! }
//! ```
//!
//! # Error Handling
//!
//! Every source failure is an [`Error`] whose [`SourceErrorKind`] decides what
//! the widget shows:
//!
//! ```rust
//! use tonic_metrics::{Error, SourceErrorKind};
//!
//! let err = Error::SourceUnavailable("no battery present".into());
//! assert_eq!(err.kind(), SourceErrorKind::Unavailable);
//! assert!(err.kind().is_permanent());
//! ```

pub mod battery;
pub mod bluetooth;
pub mod config;
pub mod core;
pub mod cpu;
pub mod disk;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod helper;
pub mod history;
pub mod logging;
pub mod memory;
pub mod network;
pub mod notification;
pub mod platform;
pub mod scheduler;
pub mod sensors;
pub mod store;
pub mod traits;

pub use error::{Error, Result, SourceErrorKind};

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::{
        core::prelude::*,
        engine::{Engine, EngineBuilder},
        error::{Error, Result, SourceErrorKind},
        history::HistoryBuffer,
        store::{Snapshot, SnapshotStore, SourceStatus, StoreEvent},
        traits::MetricSource,
    };
}

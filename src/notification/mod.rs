//! # Notification Module
//!
//! Threshold checks on fresh readings and delivery of the resulting user
//! notifications.
//!
//! A threshold fires when its condition goes from not-met to met, the
//! minimum interval since its last firing has elapsed and do-not-disturb
//! is off. Delivery never blocks the refresh tick: each notification is
//! handed to the [`Notifier`] on its own task and failures are only logged.

mod checker;
mod delivery;
mod types;

pub use checker::{ThresholdChecker, ThresholdState};
#[cfg(test)]
pub use delivery::MockNotifier;
#[cfg(target_os = "macos")]
pub use delivery::OsascriptNotifier;
pub use delivery::{dispatch, LogNotifier, Notifier};
pub use types::*;

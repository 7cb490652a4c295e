//! # Battery Module
//!
//! Charge level, charging state, power source and time remaining, plus the
//! cycle count, health and temperature when the platform reports them.
//!
//! Machines without a battery report [`Error::SourceUnavailable`] so the
//! widget hides itself.
//!
//! [`Error::SourceUnavailable`]: crate::Error::SourceUnavailable

mod source;
mod types;

#[cfg(test)]
mod tests;

pub use source::{BatterySource, DEFAULT_INTERVAL};
pub use types::*;

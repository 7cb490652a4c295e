//! # Sensors Module
//!
//! Named temperature sensors and fan speeds. On macOS they come from the
//! SMC, on Linux from hwmon.

mod source;
mod types;

pub use source::{SensorsSource, DEFAULT_INTERVAL};
pub use types::*;

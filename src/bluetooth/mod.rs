//! # Bluetooth Module
//!
//! Paired Bluetooth devices, their connection state and the battery levels
//! of connected accessories.

mod source;
mod types;

pub use source::{BluetoothSource, DEFAULT_INTERVAL};
pub use types::*;

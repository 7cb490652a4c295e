//! # CPU Module
//!
//! CPU usage for the menu-bar widget: whole-package user, system and idle
//! shares, per-core busy shares, and the optional frequency, temperature and
//! load average shown in the popover.
//!
//! ## Example
//!
//! ```rust
//! use tonic_metrics::cpu::CpuTicks;
//!
//! let window = CpuTicks::new(30, 20, 50, 0);
//! assert_eq!(window.load().total().as_f64(), 50.0);
//! ```

mod source;
mod types;

pub use source::{CpuSource, DEFAULT_INTERVAL};
pub use types::*;

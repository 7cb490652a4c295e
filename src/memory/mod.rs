//! # Memory Module
//!
//! Physical memory usage, its app/wired/compressed breakdown, swap usage and
//! the kernel's memory pressure level.

mod source;
mod types;

pub use source::{MemorySource, DEFAULT_INTERVAL};
pub use types::*;

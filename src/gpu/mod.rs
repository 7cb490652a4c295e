//! # GPU Module
//!
//! Utilization of every graphics accelerator. Apple GPUs also report their
//! renderer and tiler shares.

mod source;
mod types;

pub use source::{GpuSource, DEFAULT_INTERVAL};
pub use types::*;

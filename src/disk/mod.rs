//! # Disk Module
//!
//! Capacity of one monitored volume plus read and write throughput across
//! all physical disks.

mod constants;
mod source;
mod types;

#[cfg(test)]
mod tests;

pub use constants::*;
pub use source::DiskSource;
pub use types::*;

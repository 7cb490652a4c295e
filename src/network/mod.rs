//! # Network Module
//!
//! Download and upload throughput of the primary interface, cumulative
//! traffic, and the public IP address (refreshed at most every ten minutes).

mod constants;
mod public_ip;
mod source;
mod traffic;
mod types;

#[cfg(test)]
mod tests;

pub use constants::*;
#[cfg(feature = "public-ip")]
pub use public_ip::IpifyLookup;
pub use public_ip::PublicIpLookup;
pub use source::NetworkSource;
pub use traffic::{TrafficData, TrafficTracker};
pub use types::*;

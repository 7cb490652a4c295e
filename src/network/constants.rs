use std::time::Duration;

/// Default polling interval for interface throughput
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum time between two public IP lookups
pub const PUBLIC_IP_REFRESH: Duration = Duration::from_secs(10 * 60);

/// Interface name prefixes that never carry the primary route
pub const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &["utun", "awdl", "llw", "anpi", "bridge", "gif", "stf", "ap", "docker", "veth", "virbr"];

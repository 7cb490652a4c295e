use std::time::Duration;

/// Default polling interval for disk capacity and activity
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Volume monitored when none is configured
pub const DEFAULT_MOUNT_POINT: &str = "/";

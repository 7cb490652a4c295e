// Core modules
pub mod metrics;
pub mod types;

/// Core prelude module that re-exports commonly used types
pub mod prelude {
    pub use super::metrics::{MetricFamily, MetricReading, Series};
    pub use super::types::{ByteSize, Percentage, Temperature};
}

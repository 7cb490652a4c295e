// Traits module
//
// Trait definitions shared across the codebase live here so that family
// modules, the scheduler and tests depend on the seam and not on each other.

pub mod source;

#[cfg(test)]
pub use source::MockMetricSource;
pub use source::MetricSource;

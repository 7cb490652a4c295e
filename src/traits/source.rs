use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::core::metrics::{MetricFamily, MetricReading};
use crate::error::Result;

/// A producer of readings for one metric family
///
/// Implementors translate one OS facility into a [`MetricReading`]. A source
/// must never panic on OS failure: every failure is returned as an
/// [`Error`](crate::Error) whose [`kind`](crate::Error::kind) tells the
/// snapshot store whether to keep the previous reading or hide the widget.
///
/// # Examples
///
/// ```rust
/// use std::time::{Duration, SystemTime};
/// use tonic_metrics::prelude::*;
///
/// struct FixedBattery;
///
/// #[async_trait::async_trait]
/// impl MetricSource for FixedBattery {
///     fn family(&self) -> MetricFamily {
///         MetricFamily::Battery
///     }
///
///     fn preferred_interval(&self) -> Duration {
///         Duration::from_secs(10)
///     }
///
///     async fn read(&self) -> Result<MetricReading> {
///         Err(Error::SourceUnavailable("no battery".into()))
///     }
/// }
/// ```
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// The family every reading of this source belongs to
    fn family(&self) -> MetricFamily;

    /// How often the source wants to be polled
    fn preferred_interval(&self) -> Duration;

    /// Take one sample
    async fn read(&self) -> Result<MetricReading>;
}

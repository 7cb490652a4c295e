use std::{sync::Arc, time::Duration};

use crate::{
    battery::{BatterySource, BatteryStatus, ChargeState, PowerSource},
    core::types::{Percentage, Temperature},
    error::SourceErrorKind,
    platform::MockSystemProbe,
    prelude::*,
};

fn status() -> BatteryStatus {
    BatteryStatus {
        level: Percentage::from_f64(42.0),
        state: ChargeState::Discharging,
        power_source: PowerSource::Battery,
        time_remaining: Some(Duration::from_secs(90 * 60)),
        cycle_count: Some(412),
        health: Some(Percentage::from_f64(88.0)),
        temperature: Some(Temperature::new(31.2)),
    }
}

#[tokio::test]
async fn test_battery_reading_series() {
    let mut probe = MockSystemProbe::new();
    probe.expect_battery_status().returning(|| Ok(Some(status())));
    let reading = BatterySource::new(Arc::new(probe)).read().await.unwrap();

    assert_eq!(reading.family(), MetricFamily::Battery);
    assert_eq!(reading.primary_value(), Some(42.0));
    assert_eq!(reading.field("health"), Some(88.0));
    assert_eq!(reading.field("minutes_remaining"), Some(90.0));
    assert_eq!(reading.field("cycle_count"), Some(412.0));
}

#[tokio::test]
async fn test_no_battery_is_permanently_unavailable() {
    let mut probe = MockSystemProbe::new();
    probe.expect_battery_status().returning(|| Ok(None));
    let err = BatterySource::new(Arc::new(probe)).read().await.unwrap_err();

    assert_eq!(err.kind(), SourceErrorKind::Unavailable);
    assert!(err.kind().is_permanent());
}

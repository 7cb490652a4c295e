use std::{sync::Arc, time::Duration};

use crate::{
    disk::{DiskIoCounters, DiskReading, DiskSource, VolumeStats},
    error::{Error, SourceErrorKind},
    platform::MockSystemProbe,
    prelude::*,
};

const GB: u64 = 1024 * 1024 * 1024;

fn probe(io: Vec<DiskIoCounters>) -> MockSystemProbe {
    let mut probe = MockSystemProbe::new();
    probe.expect_volume_stats().returning(|mount_point| {
        Ok(VolumeStats { mount_point: mount_point.to_string(), total: 500 * GB, available: 190 * GB })
    });
    let mut io = io.into_iter();
    probe
        .expect_disk_io_counters()
        .returning(move || io.next().ok_or_else(|| Error::unavailable("no block storage")));
    probe
}

fn disk(reading: MetricReading) -> DiskReading {
    match reading {
        MetricReading::Disk(disk) => disk,
        other => panic!("expected a disk reading, got {}", other.family()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_capacity_and_throughput() {
    let counters = vec![
        DiskIoCounters { read_bytes: 1_000, write_bytes: 5_000 },
        DiskIoCounters { read_bytes: 101_000, write_bytes: 25_000 },
    ];
    let source = DiskSource::new(Arc::new(probe(counters)));

    let first = disk(source.read().await.unwrap());
    assert_eq!(first.mount_point, "/");
    assert_eq!(first.usage().as_f64(), 62.0);
    assert_eq!(first.read_rate, None);

    tokio::time::advance(Duration::from_secs(10)).await;

    let second = disk(source.read().await.unwrap());
    assert_eq!(second.read_rate, Some(10_000.0));
    assert_eq!(second.write_rate, Some(2_000.0));
    assert_eq!(second.free.as_bytes(), 190 * GB);
}

#[tokio::test]
async fn test_missing_io_counters_still_reports_capacity() {
    let source = DiskSource::with_mount_point(Arc::new(probe(vec![])), "/Volumes/Data");
    let reading = disk(source.read().await.unwrap());
    assert_eq!(reading.mount_point, "/Volumes/Data");
    assert_eq!(reading.read_rate, None);
    assert_eq!(reading.write_rate, None);
}

#[tokio::test]
async fn test_volume_permission_error_propagates() {
    let mut probe = MockSystemProbe::new();
    probe
        .expect_volume_stats()
        .returning(|_| Err(Error::permission_denied("full disk access required")));
    let source = DiskSource::new(Arc::new(probe));
    let err = source.read().await.unwrap_err();
    assert_eq!(err.kind(), SourceErrorKind::PermissionDenied);
}

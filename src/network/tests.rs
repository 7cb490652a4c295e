use std::{
    net::{IpAddr, Ipv4Addr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    network::{InterfaceCounters, NetworkReading, NetworkSource, PublicIpLookup, TrafficTracker},
    platform::MockSystemProbe,
    prelude::*,
};

fn iface(name: &str, bytes_in: u64, bytes_out: u64) -> InterfaceCounters {
    InterfaceCounters {
        name: name.to_string(),
        bytes_in,
        bytes_out,
        packets_in: bytes_in / 1000,
        packets_out: bytes_out / 1000,
        is_up: true,
        is_loopback: name == "lo0",
    }
}

fn probe(samples: Vec<Vec<InterfaceCounters>>) -> Arc<MockSystemProbe> {
    let mut probe = MockSystemProbe::new();
    let mut samples = samples.into_iter();
    probe
        .expect_interface_counters()
        .returning(move || samples.next().ok_or_else(|| Error::invalid_data("out of samples")));
    Arc::new(probe)
}

fn network(reading: MetricReading) -> NetworkReading {
    match reading {
        MetricReading::Network(network) => network,
        other => panic!("expected a network reading, got {}", other.family()),
    }
}

#[derive(Debug)]
struct ScriptedLookup {
    calls: AtomicUsize,
    fail_after: usize,
}

#[async_trait]
impl PublicIpLookup for ScriptedLookup {
    async fn lookup(&self) -> Result<IpAddr> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_after {
            return Err(Error::timeout("ipify"));
        }
        Ok(IpAddr::V4(Ipv4Addr::new(203, 0, 113, call as u8 + 1)))
    }
}

#[tokio::test(start_paused = true)]
async fn test_rates_on_primary_interface() {
    let first = vec![iface("lo0", 9_000_000, 9_000_000), iface("utun3", 5_000_000, 0), iface("en0", 1_000_000, 200_000)];
    let second = vec![iface("lo0", 9_900_000, 9_900_000), iface("utun3", 9_000_000, 0), iface("en0", 1_500_000, 300_000)];
    let source = NetworkSource::new(probe(vec![first, second]));

    let initial = network(source.read().await.unwrap());
    assert_eq!(initial.interface.as_deref(), Some("en0"));
    assert_eq!(initial.download_rate, 0.0);

    tokio::time::advance(Duration::from_secs(2)).await;

    let reading = network(source.read().await.unwrap());
    assert_eq!(reading.download_rate, 250_000.0);
    assert_eq!(reading.upload_rate, 50_000.0);
    assert_eq!(reading.packets_in_rate, 250.0);
    assert_eq!(reading.packets_out_rate, 50.0);
    assert_eq!(reading.total_in.as_bytes(), 1_500_000);
    assert_eq!(reading.public_ip, None);
}

#[tokio::test]
async fn test_no_interface_up() {
    let mut down = iface("en0", 10, 10);
    down.is_up = false;
    let source = NetworkSource::new(probe(vec![vec![iface("lo0", 1, 1), down]]));
    let reading = network(source.read().await.unwrap());
    assert_eq!(reading.interface, None);
    assert_eq!(
        reading.series(),
        vec![("download", 0.0), ("upload", 0.0), ("packets_in", 0.0), ("packets_out", 0.0)]
    );
}

/// Lets spawned lookups finish
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_public_ip_refreshes_every_ten_minutes_and_survives_failure() {
    let samples = (0..6).map(|i| vec![iface("en0", i * 1000, i * 1000)]).collect();
    let lookup = Arc::new(ScriptedLookup { calls: AtomicUsize::new(0), fail_after: 1 });
    let source = NetworkSource::new(probe(samples)).with_public_ip(lookup.clone());

    // the first lookup runs in the background
    assert_eq!(network(source.read().await.unwrap()).public_ip, None);
    settle().await;

    let expected = Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1)));
    assert_eq!(network(source.read().await.unwrap()).public_ip, expected);

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(network(source.read().await.unwrap()).public_ip, expected);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

    // Due again, the lookup fails and the previous address is kept
    tokio::time::advance(Duration::from_secs(10 * 60)).await;
    assert_eq!(network(source.read().await.unwrap()).public_ip, expected);
    settle().await;
    assert_eq!(network(source.read().await.unwrap()).public_ip, expected);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
}

#[derive(Debug, Default)]
struct StalledLookup {
    calls: AtomicUsize,
}

#[async_trait]
impl PublicIpLookup for StalledLookup {
    async fn lookup(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_public_ip_lookup_does_not_delay_reading() {
    let samples = (0..3).map(|i| vec![iface("en0", i * 1000, i * 1000)]).collect();
    let lookup = Arc::new(StalledLookup::default());
    let source = NetworkSource::new(probe(samples)).with_public_ip(lookup.clone());

    let reading = tokio::time::timeout(Duration::from_millis(500), source.read()).await.unwrap().unwrap();
    let reading = network(reading);
    assert_eq!(reading.interface.as_deref(), Some("en0"));
    assert_eq!(reading.public_ip, None);

    // a lookup still in flight is not started again, even once it is overdue
    tokio::time::advance(Duration::from_secs(11 * 60)).await;
    let reading = tokio::time::timeout(Duration::from_millis(500), source.read()).await.unwrap().unwrap();
    assert!(network(reading).download_rate > 0.0);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pinned_interface() {
    let source = NetworkSource::new(probe(vec![vec![iface("en0", 500, 500), iface("en1", 10, 10)]])).with_interface("en1");
    let reading = network(source.read().await.unwrap());
    assert_eq!(reading.interface.as_deref(), Some("en1"));
}

#[test]
fn test_tracker_resets_on_interface_switch() {
    let mut tracker = TrafficTracker::new(&iface("en0", 100, 100));
    tracker.update(&iface("en1", 5, 5));
    assert_eq!(tracker.interface(), "en1");
    assert_eq!(tracker.bytes_received(), 5);
    assert_eq!(tracker.download_speed(), 0.0);
}

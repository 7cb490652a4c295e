//! # Platform Module
//!
//! The OS boundary. [`SystemProbe`] has one blocking method per OS facility;
//! metric sources call it from a blocking task through [`run_blocking`] so
//! that no async worker ever waits on a syscall or a child process.
//!
//! * macOS: mach host statistics, sysctl, the SMC through IOKit, and the
//!   `ioreg`, `pmset` and `system_profiler` tools
//! * Linux: procfs and sysfs
//! * anything else: every facility reports [`Error::SourceUnavailable`]

use std::{fmt::Debug, sync::Arc};

#[cfg(test)]
use mockall::automock;

use crate::{
    battery::BatteryStatus,
    bluetooth::BluetoothDevice,
    core::types::Temperature,
    cpu::{CpuTicks, LoadAverage},
    disk::{DiskIoCounters, VolumeStats},
    error::{Error, Result},
    gpu::GpuDevice,
    memory::MemoryStats,
    network::InterfaceCounters,
    sensors::SensorSnapshot,
};

pub mod parse;
pub mod smc;

#[cfg(target_os = "macos")]
mod darwin;
#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
pub use darwin::DarwinProbe;
#[cfg(target_os = "linux")]
pub use linux::LinuxProbe;

/// Blocking access to the OS facilities behind every metric family
///
/// Every method may fail independently. Implementations report a missing
/// facility as [`Error::SourceUnavailable`] and never panic.
#[cfg_attr(test, automock)]
pub trait SystemProbe: Send + Sync + Debug {
    /// Cumulative tick counters per logical core
    fn cpu_ticks(&self) -> Result<Vec<CpuTicks>>;

    fn load_average(&self) -> Result<LoadAverage>;

    fn cpu_frequency_mhz(&self) -> Result<f64>;

    /// Hottest CPU die or proximity sensor
    fn cpu_temperature(&self) -> Result<Temperature>;

    fn memory_stats(&self) -> Result<MemoryStats>;

    /// Capacity of the volume mounted at `mount_point`
    fn volume_stats(&self, mount_point: &str) -> Result<VolumeStats>;

    /// Cumulative bytes read and written by all physical disks
    fn disk_io_counters(&self) -> Result<DiskIoCounters>;

    fn interface_counters(&self) -> Result<Vec<InterfaceCounters>>;

    fn gpu_devices(&self) -> Result<Vec<GpuDevice>>;

    /// `Ok(None)` when the machine has no battery
    fn battery_status(&self) -> Result<Option<BatteryStatus>>;

    /// All temperature sensors and fans
    fn sensors(&self) -> Result<SensorSnapshot>;

    fn bluetooth_devices(&self) -> Result<Vec<BluetoothDevice>>;
}

/// The probe for the host this binary runs on
pub fn native() -> Arc<dyn SystemProbe> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(DarwinProbe::new())
    }
    #[cfg(target_os = "linux")]
    {
        Arc::new(LinuxProbe::new())
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Arc::new(UnsupportedProbe)
    }
}

/// Runs one probe call on tokio's blocking pool
pub(crate) async fn run_blocking<T, F>(probe: &Arc<dyn SystemProbe>, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn SystemProbe) -> Result<T> + Send + 'static,
{
    let probe = Arc::clone(probe);
    tokio::task::spawn_blocking(move || call(probe.as_ref()))
        .await
        .map_err(|e| Error::system(format!("probe task failed: {}", e)))?
}

/// `statvfs(3)` on a mount point
#[cfg(unix)]
pub(crate) fn statvfs(mount_point: &str) -> Result<VolumeStats> {
    use std::{ffi::CString, mem::MaybeUninit};

    let path = CString::new(mount_point)
        .map_err(|_| Error::invalid_config(format!("mount point contains NUL: {:?}", mount_point)))?;
    let mut stats = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: `path` is NUL-terminated and `stats` is large enough for the result
    let rc = unsafe { libc::statvfs(path.as_ptr(), stats.as_mut_ptr()) };
    if rc != 0 {
        return Err(Error::from(std::io::Error::last_os_error()));
    }
    // SAFETY: statvfs returned 0, so the struct is initialized
    let stats = unsafe { stats.assume_init() };
    let fragment = stats.f_frsize as u64;

    Ok(VolumeStats {
        mount_point: mount_point.to_string(),
        total: stats.f_blocks as u64 * fragment,
        available: stats.f_bavail as u64 * fragment,
    })
}

/// Runs a command-line tool and returns its stdout
#[cfg(target_os = "macos")]
pub(crate) fn command_output(program: &str, args: &[&str]) -> Result<String> {
    let output = std::process::Command::new(program).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::unavailable(format!("{} is not installed", program))
        } else {
            Error::from(e)
        }
    })?;
    if !output.status.success() {
        return Err(Error::invalid_data(format!("{} {} exited with {}", program, args.join(" "), output.status)));
    }
    String::from_utf8(output.stdout).map_err(|_| Error::invalid_data(format!("{} printed non-UTF-8 output", program)))
}

/// Probe for hosts with no supported telemetry facilities
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
#[derive(Debug, Default)]
pub struct UnsupportedProbe;

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl UnsupportedProbe {
    fn unsupported<T>(&self, facility: &str) -> Result<T> {
        Err(Error::unavailable(format!("{} is not supported on this platform", facility)))
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl SystemProbe for UnsupportedProbe {
    fn cpu_ticks(&self) -> Result<Vec<CpuTicks>> {
        self.unsupported("cpu ticks")
    }

    fn load_average(&self) -> Result<LoadAverage> {
        self.unsupported("load average")
    }

    fn cpu_frequency_mhz(&self) -> Result<f64> {
        self.unsupported("cpu frequency")
    }

    fn cpu_temperature(&self) -> Result<Temperature> {
        self.unsupported("cpu temperature")
    }

    fn memory_stats(&self) -> Result<MemoryStats> {
        self.unsupported("memory statistics")
    }

    fn volume_stats(&self, _mount_point: &str) -> Result<VolumeStats> {
        self.unsupported("volume statistics")
    }

    fn disk_io_counters(&self) -> Result<DiskIoCounters> {
        self.unsupported("disk io counters")
    }

    fn interface_counters(&self) -> Result<Vec<InterfaceCounters>> {
        self.unsupported("interface counters")
    }

    fn gpu_devices(&self) -> Result<Vec<GpuDevice>> {
        self.unsupported("gpu statistics")
    }

    fn battery_status(&self) -> Result<Option<BatteryStatus>> {
        self.unsupported("battery status")
    }

    fn sensors(&self) -> Result<SensorSnapshot> {
        self.unsupported("sensors")
    }

    fn bluetooth_devices(&self) -> Result<Vec<BluetoothDevice>> {
        self.unsupported("bluetooth")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_statvfs_root() {
        let stats = statvfs("/").unwrap();
        assert_eq!(stats.mount_point, "/");
        assert!(stats.total > 0);
        assert!(stats.available <= stats.total);
    }

    #[test]
    fn test_statvfs_missing_path_is_unavailable() {
        let err = statvfs("/definitely/not/a/mount/point").unwrap_err();
        assert_eq!(err.kind(), crate::error::SourceErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_run_blocking_returns_probe_result() {
        let mut probe = MockSystemProbe::new();
        probe.expect_cpu_frequency_mhz().returning(|| Ok(3200.0));
        let probe: Arc<dyn SystemProbe> = Arc::new(probe);

        let mhz = run_blocking(&probe, |p| p.cpu_frequency_mhz()).await.unwrap();
        assert_eq!(mhz, 3200.0);
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::trace;

use super::{parse, statvfs, SystemProbe};
use crate::{
    battery::BatteryStatus,
    bluetooth::BluetoothDevice,
    core::types::{Percentage, Temperature},
    cpu::{CpuTicks, LoadAverage},
    disk::{DiskIoCounters, VolumeStats},
    error::{Error, Result},
    gpu::GpuDevice,
    memory::MemoryStats,
    network::InterfaceCounters,
    sensors::{Fan, SensorGroup, SensorSnapshot, TemperatureSensor},
};

/// Linux implementation of [`SystemProbe`] over procfs and sysfs
///
/// The roots are configurable so tests can point the probe at a fixture
/// tree.
#[derive(Debug, Clone)]
pub struct LinuxProbe {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::with_roots("/proc", "/sys")
    }
}

impl LinuxProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self { proc_root: proc_root.into(), sys_root: sys_root.into() }
    }

    fn read_proc(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.proc_root.join(name))?)
    }

    /// Entries of a sysfs class directory, sorted by name. A missing class
    /// reads as empty.
    fn class_entries(&self, class: &str) -> Result<Vec<PathBuf>> {
        let dir = self.sys_root.join("class").join(class);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths = entries.filter_map(|e| e.ok().map(|e| e.path())).collect::<Vec<_>>();
        paths.sort();
        Ok(paths)
    }

    fn hwmon_group(chip: &str) -> SensorGroup {
        match chip {
            "coretemp" | "k10temp" | "zenpower" | "cpu_thermal" => SensorGroup::Cpu,
            "amdgpu" | "radeon" | "nouveau" => SensorGroup::Gpu,
            c if c.starts_with("BAT") || c == "battery" => SensorGroup::Battery,
            _ => SensorGroup::System,
        }
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_number(path: &Path) -> Option<f64> {
    read_trimmed(path)?.parse().ok()
}

/// Numbered attribute indices present in a hwmon directory, e.g. the `1`
/// and `2` of `temp1_input` and `temp2_input`
fn hwmon_indices(dir: &Path, prefix: &str) -> Vec<u8> {
    let mut indices = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.strip_prefix(prefix)?.strip_suffix("_input")?.parse::<u8>().ok()
        })
        .collect::<Vec<_>>();
    indices.sort_unstable();
    indices
}

impl SystemProbe for LinuxProbe {
    fn cpu_ticks(&self) -> Result<Vec<CpuTicks>> {
        parse::proc_stat(&self.read_proc("stat")?)
    }

    fn load_average(&self) -> Result<LoadAverage> {
        parse::proc_loadavg(&self.read_proc("loadavg")?)
    }

    fn cpu_frequency_mhz(&self) -> Result<f64> {
        let path = self.sys_root.join("devices/system/cpu/cpu0/cpufreq/scaling_cur_freq");
        let khz = fs::read_to_string(&path)?;
        khz.trim()
            .parse::<f64>()
            .map(|khz| khz / 1000.0)
            .map_err(|_| Error::invalid_data(format!("unparseable cpu frequency: {:?}", khz)))
    }

    fn cpu_temperature(&self) -> Result<Temperature> {
        self.sensors()?
            .temperatures
            .into_iter()
            .filter(|s| s.group == SensorGroup::Cpu)
            .map(|s| s.value)
            .fold(None, |max: Option<Temperature>, t| Some(max.map_or(t, |m| if t > m { t } else { m })))
            .ok_or_else(|| Error::unavailable("no CPU hwmon sensor"))
    }

    fn memory_stats(&self) -> Result<MemoryStats> {
        parse::proc_meminfo(&self.read_proc("meminfo")?)
    }

    fn volume_stats(&self, mount_point: &str) -> Result<VolumeStats> {
        statvfs(mount_point)
    }

    fn disk_io_counters(&self) -> Result<DiskIoCounters> {
        parse::proc_diskstats(&self.read_proc("diskstats")?)
    }

    fn interface_counters(&self) -> Result<Vec<InterfaceCounters>> {
        let mut interfaces = parse::proc_net_dev(&self.read_proc("net/dev")?)?;
        for interface in interfaces.iter_mut().filter(|i| !i.is_loopback) {
            let state = self.sys_root.join("class/net").join(&interface.name).join("operstate");
            if let Some(state) = read_trimmed(&state) {
                interface.is_up = state == "up";
            }
        }
        Ok(interfaces)
    }

    fn gpu_devices(&self) -> Result<Vec<GpuDevice>> {
        let mut devices = Vec::new();
        for card in self.class_entries("drm")? {
            let Some(busy) = read_number(&card.join("device/gpu_busy_percent")) else { continue };
            let driver = read_trimmed(&card.join("device/uevent")).and_then(|uevent| {
                uevent.lines().find_map(|l| l.strip_prefix("DRIVER=").map(str::to_string))
            });
            let card_name = card.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            devices.push(GpuDevice {
                name: driver.unwrap_or(card_name),
                utilization: Percentage::from_f64(busy),
                renderer: None,
                tiler: None,
            });
        }
        if devices.is_empty() {
            return Err(Error::unavailable("no DRM device reports gpu_busy_percent"));
        }
        Ok(devices)
    }

    fn battery_status(&self) -> Result<Option<BatteryStatus>> {
        for supply in self.class_entries("power_supply")? {
            let Some(uevent) = read_trimmed(&supply.join("uevent")) else { continue };
            if let Some(status) = parse::power_supply_uevent(&uevent)? {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    fn sensors(&self) -> Result<SensorSnapshot> {
        let mut snapshot = SensorSnapshot::default();
        for hwmon in self.class_entries("hwmon")? {
            let chip = read_trimmed(&hwmon.join("name")).unwrap_or_default();
            let group = Self::hwmon_group(&chip);

            for i in hwmon_indices(&hwmon, "temp") {
                let Some(millis) = read_number(&hwmon.join(format!("temp{}_input", i))) else { continue };
                let value = Temperature::new(millis / 1000.0);
                if !value.is_plausible() {
                    continue;
                }
                let label = read_trimmed(&hwmon.join(format!("temp{}_label", i)))
                    .unwrap_or_else(|| format!("{} {}", chip, i));
                snapshot.temperatures.push(TemperatureSensor {
                    key: format!("{}/temp{}", chip, i),
                    name: label,
                    group,
                    value,
                });
            }

            for i in hwmon_indices(&hwmon, "fan") {
                let Some(rpm) = read_number(&hwmon.join(format!("fan{}_input", i))) else { continue };
                snapshot.fans.push(Fan {
                    id: snapshot.fans.len() as u8,
                    rpm,
                    min_rpm: read_number(&hwmon.join(format!("fan{}_min", i))),
                    max_rpm: read_number(&hwmon.join(format!("fan{}_max", i))),
                });
            }
        }
        trace!(temperatures = snapshot.temperatures.len(), fans = snapshot.fans.len(), "Read hwmon");
        if snapshot.temperatures.is_empty() && snapshot.fans.is_empty() {
            return Err(Error::unavailable("no hwmon sensors"));
        }
        Ok(snapshot)
    }

    fn bluetooth_devices(&self) -> Result<Vec<BluetoothDevice>> {
        Err(Error::unavailable("bluetooth inventory is only available on macOS"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> (TempDir, LinuxProbe) {
        let dir = TempDir::new().unwrap();
        let proc_root = dir.path().join("proc");
        let sys_root = dir.path().join("sys");
        write(&proc_root, "loadavg", "0.50 0.75 1.00 2/300 4242\n");
        write(&sys_root, "class/hwmon/hwmon0/name", "coretemp\n");
        write(&sys_root, "class/hwmon/hwmon0/temp1_input", "52000\n");
        write(&sys_root, "class/hwmon/hwmon0/temp1_label", "Package id 0\n");
        write(&sys_root, "class/hwmon/hwmon0/temp2_input", "61000\n");
        write(&sys_root, "class/hwmon/hwmon1/name", "thinkpad\n");
        write(&sys_root, "class/hwmon/hwmon1/fan1_input", "2400\n");
        write(&sys_root, "class/drm/card0/device/gpu_busy_percent", "17\n");
        write(&sys_root, "class/drm/card0/device/uevent", "DRIVER=amdgpu\nPCI_ID=1002:73BF\n");
        (dir, LinuxProbe::with_roots(proc_root, sys_root))
    }

    #[test]
    fn test_sensors_from_hwmon() {
        let (_dir, probe) = fixture();
        let snapshot = probe.sensors().unwrap();
        assert_eq!(snapshot.temperatures.len(), 2);
        assert_eq!(snapshot.temperatures[0].name, "Package id 0");
        assert_eq!(snapshot.temperatures[0].group, SensorGroup::Cpu);
        assert_eq!(snapshot.fans.len(), 1);
        assert_eq!(snapshot.fans[0].rpm, 2400.0);
        assert_eq!(probe.cpu_temperature().unwrap(), Temperature::new(61.0));
    }

    #[test]
    fn test_gpu_and_load_average() {
        let (_dir, probe) = fixture();
        let gpus = probe.gpu_devices().unwrap();
        assert_eq!(gpus[0].name, "amdgpu");
        assert_eq!(gpus[0].utilization.as_f64(), 17.0);
        assert_eq!(probe.load_average().unwrap().five, 0.75);
    }

    #[test]
    fn test_missing_facilities_are_unavailable() {
        let (_dir, probe) = fixture();
        assert!(probe.battery_status().unwrap().is_none());
        assert_eq!(probe.memory_stats().unwrap_err().kind(), crate::error::SourceErrorKind::Unavailable);
        assert_eq!(probe.bluetooth_devices().unwrap_err().kind(), crate::error::SourceErrorKind::Unavailable);
    }
}

mod bindings;
mod smc;

use std::{
    ffi::{CStr, CString},
    mem,
    os::raw::c_void,
    ptr,
};

use parking_lot::Mutex;
use scopeguard::defer;
use tracing::debug;

use self::{bindings::*, smc::SmcConnection};
use super::{command_output, parse, smc::FAN_COUNT_KEY, smc::TEMPERATURE_KEYS, statvfs, SystemProbe};
use crate::{
    battery::BatteryStatus,
    bluetooth::BluetoothDevice,
    core::types::Temperature,
    cpu::{CpuTicks, LoadAverage},
    disk::{DiskIoCounters, VolumeStats},
    error::{Error, Result},
    gpu::GpuDevice,
    memory::{MemoryStats, PressureLevel, SwapUsage},
    network::InterfaceCounters,
    sensors::{Fan, SensorGroup, SensorSnapshot, TemperatureSensor},
};

/// macOS implementation of [`SystemProbe`]
///
/// The SMC connection is opened on first use and kept for the lifetime of
/// the probe.
#[derive(Debug, Default)]
pub struct DarwinProbe {
    smc: Mutex<Option<SmcConnection>>,
}

impl DarwinProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_smc<T>(&self, f: impl FnOnce(&SmcConnection) -> Result<T>) -> Result<T> {
        let mut guard = self.smc.lock();
        if guard.is_none() {
            *guard = Some(SmcConnection::open()?);
        }
        match guard.as_ref() {
            Some(smc) => f(smc),
            None => Err(Error::unavailable("SMC connection not open")),
        }
    }

    fn read_temperatures(smc: &SmcConnection) -> Vec<TemperatureSensor> {
        TEMPERATURE_KEYS
            .iter()
            .filter_map(|sensor| {
                let value = Temperature::new(smc.read(sensor.key).ok()?);
                value.is_plausible().then(|| TemperatureSensor {
                    key: sensor.key.to_string(),
                    name: sensor.name.to_string(),
                    group: sensor.group,
                    value,
                })
            })
            .collect()
    }

    fn read_fans(smc: &SmcConnection) -> Vec<Fan> {
        let count = smc.read(FAN_COUNT_KEY).map(|n| n as u8).unwrap_or(0);
        (0..count)
            .filter_map(|id| {
                let [actual, min, max] = super::smc::fan_keys(id);
                Some(Fan {
                    id,
                    rpm: smc.read(&actual).ok()?,
                    min_rpm: smc.read(&min).ok(),
                    max_rpm: smc.read(&max).ok(),
                })
            })
            .collect()
    }
}

fn sysctl_by_name<T: Default>(name: &str) -> Result<T> {
    let c_name = CString::new(name).map_err(|_| Error::invalid_config(format!("bad sysctl name {:?}", name)))?;
    let mut value = T::default();
    let mut size = mem::size_of::<T>();
    // SAFETY: `value` is a T and `size` is its size
    let rc = unsafe {
        libc::sysctlbyname(
            c_name.as_ptr(),
            (&mut value as *mut T).cast::<c_void>(),
            &mut size,
            ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(match err.raw_os_error() {
            Some(libc::ENOENT) => Error::unavailable(format!("sysctl {} not present", name)),
            _ => Error::system(format!("sysctl {} failed: {}", name, err)),
        });
    }
    Ok(value)
}

impl SystemProbe for DarwinProbe {
    fn cpu_ticks(&self) -> Result<Vec<CpuTicks>> {
        let mut cpu_count: natural_t = 0;
        let mut info: *mut integer_t = ptr::null_mut();
        let mut info_count: u32 = 0;

        // SAFETY: out-pointers are valid; on success the kernel hands us a
        // vm allocation of `info_count` integers that we release below
        let kr = unsafe {
            host_processor_info(mach_host_self(), PROCESSOR_CPU_LOAD_INFO, &mut cpu_count, &mut info, &mut info_count)
        };
        if kr != KERN_SUCCESS || info.is_null() {
            return Err(Error::system(format!("host_processor_info failed: {}", kr)));
        }
        defer! {
            // SAFETY: releases the allocation returned above
            unsafe {
                vm_deallocate(mach_task_self(), info as usize, info_count as usize * mem::size_of::<integer_t>());
            }
        }

        // SAFETY: the kernel returned `info_count` integers at `info`
        let raw = unsafe { std::slice::from_raw_parts(info, info_count as usize) };
        let ticks = raw
            .chunks_exact(CPU_STATE_MAX)
            .take(cpu_count as usize)
            .map(|core| {
                let tick = |state: usize| core[state] as u32 as u64;
                CpuTicks::new(
                    tick(CPU_STATE_USER),
                    tick(CPU_STATE_SYSTEM),
                    tick(CPU_STATE_IDLE),
                    tick(CPU_STATE_NICE),
                )
            })
            .collect::<Vec<_>>();
        if ticks.is_empty() {
            return Err(Error::invalid_data("host_processor_info returned no processors"));
        }
        Ok(ticks)
    }

    fn load_average(&self) -> Result<LoadAverage> {
        let mut loads = [0f64; 3];
        // SAFETY: `loads` has room for the three requested samples
        let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
        if n != 3 {
            return Err(Error::system("getloadavg failed"));
        }
        Ok(LoadAverage { one: loads[0], five: loads[1], fifteen: loads[2] })
    }

    fn cpu_frequency_mhz(&self) -> Result<f64> {
        // Intel only. Apple Silicon does not publish a nominal frequency.
        let hz: u64 = sysctl_by_name("hw.cpufrequency")?;
        Ok(hz as f64 / 1_000_000.0)
    }

    fn cpu_temperature(&self) -> Result<Temperature> {
        self.with_smc(|smc| {
            Self::read_temperatures(smc)
                .into_iter()
                .filter(|s| s.group == SensorGroup::Cpu)
                .map(|s| s.value)
                .fold(None, |max: Option<Temperature>, t| Some(max.map_or(t, |m| if t > m { t } else { m })))
                .ok_or_else(|| Error::unavailable("no CPU temperature keys on this SMC"))
        })
    }

    fn memory_stats(&self) -> Result<MemoryStats> {
        let total: u64 = sysctl_by_name("hw.memsize")?;

        let mut vm = vm_statistics64::default();
        let mut count = HOST_VM_INFO64_COUNT;
        // SAFETY: `vm` has room for HOST_VM_INFO64_COUNT integers
        let kr = unsafe {
            host_statistics64(mach_host_self(), HOST_VM_INFO64, (&mut vm as *mut vm_statistics64).cast(), &mut count)
        };
        if kr != KERN_SUCCESS {
            return Err(Error::system(format!("host_statistics64 failed: {}", kr)));
        }

        // SAFETY: sysconf has no preconditions
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(4096) as u64;
        let pages = |n: natural_t| n as u64 * page_size;

        let wired = pages(vm.wire_count);
        let compressed = pages(vm.compressor_page_count);
        let used = (pages(vm.active_count)
            + pages(vm.inactive_count)
            + pages(vm.speculative_count)
            + wired
            + compressed)
            .saturating_sub(pages(vm.purgeable_count) + pages(vm.external_page_count))
            .min(total);

        let swap: xsw_usage = sysctl_by_name("vm.swapusage").unwrap_or_default();
        let pressure = sysctl_by_name::<u32>("kern.memorystatus_vm_pressure_level")
            .map(PressureLevel::from_kernel_level)
            .ok();

        Ok(MemoryStats {
            total,
            used,
            app: used.saturating_sub(wired + compressed),
            wired,
            compressed,
            swap: SwapUsage { total: swap.xsu_total.into(), used: swap.xsu_used.into() },
            pressure,
        })
    }

    fn volume_stats(&self, mount_point: &str) -> Result<VolumeStats> {
        statvfs(mount_point)
    }

    fn disk_io_counters(&self) -> Result<DiskIoCounters> {
        let text = command_output("/usr/sbin/ioreg", &["-r", "-c", "IOBlockStorageDriver", "-w", "0"])?;
        parse::ioreg_block_storage(&text)
    }

    fn interface_counters(&self) -> Result<Vec<InterfaceCounters>> {
        let mut mib = [libc::CTL_NET, libc::PF_ROUTE, 0, 0, NET_RT_IFLIST2, 0];
        let mut len = 0usize;
        // SAFETY: a null buffer asks for the required length
        let rc = unsafe { libc::sysctl(mib.as_mut_ptr(), 6, ptr::null_mut(), &mut len, ptr::null_mut(), 0) };
        if rc != 0 {
            return Err(Error::system(format!("sysctl NET_RT_IFLIST2 size failed: {}", std::io::Error::last_os_error())));
        }
        let mut buf = vec![0u8; len];
        // SAFETY: `buf` is `len` bytes long
        let rc = unsafe {
            libc::sysctl(mib.as_mut_ptr(), 6, buf.as_mut_ptr().cast(), &mut len, ptr::null_mut(), 0)
        };
        if rc != 0 {
            return Err(Error::system(format!("sysctl NET_RT_IFLIST2 failed: {}", std::io::Error::last_os_error())));
        }

        let mut interfaces = Vec::new();
        let mut offset = 0;
        while offset + mem::size_of::<if_msghdr>() <= len {
            // SAFETY: at least a header's worth of bytes remains
            let header: if_msghdr = unsafe { ptr::read_unaligned(buf.as_ptr().add(offset).cast()) };
            let msg_len = header.ifm_msglen as usize;
            if msg_len == 0 {
                break;
            }
            if header.ifm_type == RTM_IFINFO2 && offset + mem::size_of::<if_msghdr2>() <= len {
                // SAFETY: RTM_IFINFO2 messages start with an if_msghdr2
                let msg: if_msghdr2 = unsafe { ptr::read_unaligned(buf.as_ptr().add(offset).cast()) };
                let mut name = [0 as libc::c_char; libc::IF_NAMESIZE];
                // SAFETY: `name` is IF_NAMESIZE bytes
                let named = unsafe { libc::if_indextoname(u32::from(msg.ifm_index), name.as_mut_ptr()) };
                if !named.is_null() {
                    // SAFETY: if_indextoname wrote a NUL-terminated name
                    let name = unsafe { CStr::from_ptr(name.as_ptr()) }.to_string_lossy().into_owned();
                    interfaces.push(InterfaceCounters {
                        name,
                        bytes_in: msg.ifm_data.ifi_ibytes,
                        bytes_out: msg.ifm_data.ifi_obytes,
                        packets_in: msg.ifm_data.ifi_ipackets,
                        packets_out: msg.ifm_data.ifi_opackets,
                        is_up: msg.ifm_flags & libc::IFF_UP != 0,
                        is_loopback: msg.ifm_flags & libc::IFF_LOOPBACK != 0,
                    });
                }
            }
            offset += msg_len;
        }
        debug!(count = interfaces.len(), "Read interface counters");
        Ok(interfaces)
    }

    fn gpu_devices(&self) -> Result<Vec<GpuDevice>> {
        let text = command_output("/usr/sbin/ioreg", &["-r", "-d", "1", "-w", "0", "-c", "IOAccelerator"])?;
        let devices = parse::ioreg_accelerators(&text);
        if devices.is_empty() {
            return Err(Error::unavailable("no IOAccelerator reports utilization"));
        }
        Ok(devices)
    }

    fn battery_status(&self) -> Result<Option<BatteryStatus>> {
        let text = command_output("/usr/bin/pmset", &["-g", "batt"])?;
        let Some(mut status) = parse::pmset_batt(&text)? else {
            return Ok(None);
        };
        // Best effort, pmset already gave us the essentials
        if let Ok(text) = command_output("/usr/sbin/ioreg", &["-r", "-c", "AppleSmartBattery", "-w", "0"]) {
            let details = parse::ioreg_smart_battery(&text);
            status.cycle_count = details.cycle_count;
            status.health = details.health;
            status.temperature = details.temperature;
        }
        Ok(Some(status))
    }

    fn sensors(&self) -> Result<SensorSnapshot> {
        self.with_smc(|smc| {
            let snapshot = SensorSnapshot { temperatures: Self::read_temperatures(smc), fans: Self::read_fans(smc) };
            if snapshot.temperatures.is_empty() && snapshot.fans.is_empty() {
                return Err(Error::unavailable("SMC exposes no known sensor keys"));
            }
            Ok(snapshot)
        })
    }

    fn bluetooth_devices(&self) -> Result<Vec<BluetoothDevice>> {
        let json = command_output("/usr/sbin/system_profiler", &["SPBluetoothDataType", "-json"])?;
        parse::system_profiler_bluetooth(&json)
    }
}

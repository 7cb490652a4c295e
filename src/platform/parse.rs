//! Parsers for the text the OS hands back: procfs/sysfs files on Linux and
//! the output of `pmset`, `ioreg` and `system_profiler` on macOS.
//!
//! Everything here is pure so it can be tested on any host.

use std::{collections::HashSet, time::Duration};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    battery::{BatteryStatus, ChargeState, PowerSource},
    bluetooth::{BluetoothDevice, DeviceBattery},
    core::types::{Percentage, Temperature},
    cpu::{CpuTicks, LoadAverage},
    disk::DiskIoCounters,
    error::{Error, Result},
    gpu::GpuDevice,
    memory::{MemoryStats, SwapUsage},
    network::InterfaceCounters,
};

const SECTOR_SIZE: u64 = 512;

static PMSET_LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%;").expect("static regex"));
static PMSET_REMAINING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+):(\d+) remaining").expect("static regex"));
static PMSET_SOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Now drawing from '([^']+)'").expect("static regex"));
static IOREG_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([A-Za-z]+)" = (-?\d+)"#).expect("static regex"));
static IOREG_NODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\+-o (\S+)").expect("static regex"));
static IOREG_MODEL: Lazy<Regex> = Lazy::new(|| Regex::new(r#""model" = <?"([^"]+)""#).expect("static regex"));
static GPU_DEVICE_UTIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:Device Utilization %|GPU Activity\(%\))"=(\d+)"#).expect("static regex"));
static GPU_RENDERER_UTIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""Renderer Utilization %"=(\d+)"#).expect("static regex"));
static GPU_TILER_UTIL: Lazy<Regex> = Lazy::new(|| Regex::new(r#""Tiler Utilization %"=(\d+)"#).expect("static regex"));
static BLOCK_BYTES_READ: Lazy<Regex> = Lazy::new(|| Regex::new(r#""Bytes \(Read\)"=(\d+)"#).expect("static regex"));
static BLOCK_BYTES_WRITE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""Bytes \(Write\)"=(\d+)"#).expect("static regex"));

fn parse_u64(field: &str, what: &str) -> Result<u64> {
    field
        .parse::<u64>()
        .map_err(|_| Error::invalid_data(format!("unparseable {}: {:?}", what, field)))
}

/// Per-core tick counters from `/proc/stat`, in core order.
///
/// Interrupt and steal time count as system time, iowait counts as idle.
pub fn proc_stat(text: &str) -> Result<Vec<CpuTicks>> {
    let mut cores = Vec::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next() else { continue };
        if label == "cpu" || !label.starts_with("cpu") {
            continue;
        }
        let values = fields.map(|f| parse_u64(f, "cpu ticks")).collect::<Result<Vec<_>>>()?;
        if values.len() < 4 {
            return Err(Error::invalid_data(format!("short /proc/stat line: {}", line)));
        }
        let at = |i: usize| values.get(i).copied().unwrap_or(0);
        cores.push(CpuTicks::new(at(0), at(2) + at(5) + at(6) + at(7), at(3) + at(4), at(1)));
    }
    if cores.is_empty() {
        return Err(Error::invalid_data("no per-core lines in /proc/stat"));
    }
    Ok(cores)
}

/// `/proc/loadavg`
pub fn proc_loadavg(text: &str) -> Result<LoadAverage> {
    let values = text
        .split_whitespace()
        .take(3)
        .map(|f| f.parse::<f64>().map_err(|_| Error::invalid_data(format!("unparseable load average: {:?}", f))))
        .collect::<Result<Vec<_>>>()?;
    match values.as_slice() {
        [one, five, fifteen] => Ok(LoadAverage { one: *one, five: *five, fifteen: *fifteen }),
        _ => Err(Error::invalid_data("short /proc/loadavg")),
    }
}

/// `/proc/meminfo`, mapped onto the macOS style breakdown.
///
/// Used memory is everything that is not `MemAvailable`. Wired is the
/// kernel's unevictable memory, compressed is what zswap holds.
pub fn proc_meminfo(text: &str) -> Result<MemoryStats> {
    let mut kb = std::collections::HashMap::new();
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else { continue };
        if let Some(value) = rest.split_whitespace().next() {
            kb.insert(key.trim(), parse_u64(value, key)?);
        }
    }
    let get = |key: &str| kb.get(key).copied().map(|v| v * 1024);

    let total = get("MemTotal").ok_or_else(|| Error::invalid_data("MemTotal missing from /proc/meminfo"))?;
    let available = match get("MemAvailable") {
        Some(available) => available,
        None => get("MemFree").unwrap_or(0) + get("Buffers").unwrap_or(0) + get("Cached").unwrap_or(0),
    };
    let used = total.saturating_sub(available);
    let wired = get("Unevictable").unwrap_or(0).min(used);
    let compressed = get("Zswap").unwrap_or(0).min(used - wired);
    let swap_total = get("SwapTotal").unwrap_or(0);
    let swap_free = get("SwapFree").unwrap_or(0);

    Ok(MemoryStats {
        total,
        used,
        app: used - wired - compressed,
        wired,
        compressed,
        swap: SwapUsage {
            total: swap_total.into(),
            used: swap_total.saturating_sub(swap_free).into(),
        },
        pressure: None,
    })
}

/// `/proc/net/dev`. Link state is not in this file, so every interface
/// reads as up until the caller refines it.
pub fn proc_net_dev(text: &str) -> Result<Vec<InterfaceCounters>> {
    let mut interfaces = Vec::new();
    for line in text.lines().skip(2) {
        let Some((name, rest)) = line.split_once(':') else { continue };
        let values = rest
            .split_whitespace()
            .map(|f| parse_u64(f, "interface counter"))
            .collect::<Result<Vec<_>>>()?;
        if values.len() < 10 {
            return Err(Error::invalid_data(format!("short /proc/net/dev line: {}", line)));
        }
        let name = name.trim().to_string();
        interfaces.push(InterfaceCounters {
            is_loopback: name == "lo",
            name,
            bytes_in: values[0],
            packets_in: values[1],
            bytes_out: values[8],
            packets_out: values[9],
            is_up: true,
        });
    }
    Ok(interfaces)
}

/// Sums `/proc/diskstats` over whole disks, skipping partitions and virtual
/// devices so no byte is counted twice.
pub fn proc_diskstats(text: &str) -> Result<DiskIoCounters> {
    let rows = text
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            (fields.len() >= 10).then_some(fields)
        })
        .collect::<Vec<_>>();
    let names: HashSet<&str> = rows.iter().map(|f| f[2]).collect();

    // sda1 and nvme0n1p1 are partitions of sda and nvme0n1
    let is_partition = |name: &str| {
        names.iter().any(|disk| match name.strip_prefix(disk) {
            Some(rest) => {
                let number = rest.strip_prefix('p').unwrap_or(rest);
                !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
            },
            None => false,
        })
    };
    let is_virtual = |name: &str| ["loop", "ram", "zram", "dm-", "md", "sr"].iter().any(|p| name.starts_with(p));

    let mut counters = DiskIoCounters::default();
    for fields in rows.iter().filter(|f| !is_virtual(f[2]) && !is_partition(f[2])) {
        counters.read_bytes += parse_u64(fields[5], "sectors read")? * SECTOR_SIZE;
        counters.write_bytes += parse_u64(fields[9], "sectors written")? * SECTOR_SIZE;
    }
    Ok(counters)
}

/// A `/sys/class/power_supply/*/uevent` file of type `Battery`.
///
/// Returns `None` for other supply types (mains, USB).
pub fn power_supply_uevent(text: &str) -> Result<Option<BatteryStatus>> {
    let props: std::collections::HashMap<&str, &str> = text
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim_start_matches("POWER_SUPPLY_"), v.trim()))
        .collect();

    if props.get("TYPE").copied() != Some("Battery") || props.get("PRESENT").copied() == Some("0") {
        return Ok(None);
    }
    let num = |key: &str| props.get(key).and_then(|v| v.parse::<f64>().ok());

    let level = num("CAPACITY").ok_or_else(|| Error::invalid_data("battery uevent without CAPACITY"))?;
    let state = match props.get("STATUS").copied() {
        Some("Charging") => ChargeState::Charging,
        Some("Full") => ChargeState::Charged,
        Some("Not charging") => ChargeState::NotCharging,
        _ => ChargeState::Discharging,
    };
    let power_source = match state {
        ChargeState::Discharging => PowerSource::Battery,
        _ => PowerSource::AC,
    };

    let now = num("ENERGY_NOW").or_else(|| num("CHARGE_NOW"));
    let full = num("ENERGY_FULL").or_else(|| num("CHARGE_FULL"));
    let design = num("ENERGY_FULL_DESIGN").or_else(|| num("CHARGE_FULL_DESIGN"));
    let rate = num("POWER_NOW").or_else(|| num("CURRENT_NOW")).filter(|r| *r > 0.0);

    let time_remaining = match (state, now, full, rate) {
        (ChargeState::Discharging, Some(now), _, Some(rate)) => Some(hours(now / rate)),
        (ChargeState::Charging, Some(now), Some(full), Some(rate)) => Some(hours((full - now).max(0.0) / rate)),
        _ => None,
    };
    let health = match (full, design) {
        (Some(full), Some(design)) if design > 0.0 => Some(Percentage::of(full, design)),
        _ => None,
    };

    Ok(Some(BatteryStatus {
        level: Percentage::from_f64(level),
        state,
        power_source,
        time_remaining,
        cycle_count: num("CYCLE_COUNT").map(|c| c as u32).filter(|c| *c > 0),
        health,
        // tenths of a degree
        temperature: num("TEMP").map(|t| Temperature::new(t / 10.0)),
    }))
}

fn hours(h: f64) -> Duration {
    Duration::from_secs_f64((h * 3600.0).max(0.0))
}

/// `pmset -g batt`. `None` when the machine has no internal battery.
pub fn pmset_batt(text: &str) -> Result<Option<BatteryStatus>> {
    let Some(line) = text.lines().find(|l| l.contains("-InternalBattery-")) else {
        return Ok(None);
    };
    let level = PMSET_LEVEL
        .captures(line)
        .ok_or_else(|| Error::invalid_data(format!("no level in pmset line: {:?}", line)))?;
    let level = parse_u64(&level[1], "battery level")? as f64;

    let state = if line.contains("not charging") {
        ChargeState::NotCharging
    } else if line.contains("discharging") {
        ChargeState::Discharging
    } else if line.contains("charged") {
        ChargeState::Charged
    } else if line.contains("charging") || line.contains("finishing charge") {
        ChargeState::Charging
    } else {
        return Err(Error::invalid_data(format!("unknown charge state in {:?}", line)));
    };
    let power_source = match PMSET_SOURCE.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str()) {
        Some("AC Power") => PowerSource::AC,
        Some("Battery Power") => PowerSource::Battery,
        _ => PowerSource::Unknown,
    };
    let time_remaining = match PMSET_REMAINING.captures(line) {
        Some(caps) => {
            let minutes = parse_u64(&caps[1], "hours")? * 60 + parse_u64(&caps[2], "minutes")?;
            // pmset reports 0:00 when charged or while it is still estimating
            (minutes > 0).then(|| Duration::from_secs(minutes * 60))
        },
        None => None,
    };

    Ok(Some(BatteryStatus {
        level: Percentage::from_f64(level),
        state,
        power_source,
        time_remaining,
        cycle_count: None,
        health: None,
        temperature: None,
    }))
}

/// Battery details from `ioreg -r -c AppleSmartBattery`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmartBatteryDetails {
    pub cycle_count: Option<u32>,
    pub health: Option<Percentage>,
    pub temperature: Option<Temperature>,
}

pub fn ioreg_smart_battery(text: &str) -> SmartBatteryDetails {
    let mut values = std::collections::HashMap::new();
    for caps in IOREG_INT.captures_iter(text) {
        if let Ok(value) = caps[2].parse::<i64>() {
            values.entry(caps[1].to_string()).or_insert(value);
        }
    }
    let design = values.get("DesignCapacity").copied().filter(|d| *d > 0);
    // Apple Silicon reports MaxCapacity as a percentage and the mAh value
    // under AppleRawMaxCapacity
    let max = values.get("AppleRawMaxCapacity").or_else(|| values.get("MaxCapacity")).copied();

    SmartBatteryDetails {
        cycle_count: values.get("CycleCount").and_then(|c| u32::try_from(*c).ok()),
        health: match (max, design) {
            (Some(max), Some(design)) if max > 100 => Some(Percentage::of(max as f64, design as f64)),
            _ => None,
        },
        // hundredths of a degree
        temperature: values
            .get("Temperature")
            .map(|t| Temperature::new(*t as f64 / 100.0))
            .filter(Temperature::is_plausible),
    }
}

/// GPU accelerators from `ioreg -r -d 1 -w 0 -c IOAccelerator`
pub fn ioreg_accelerators(text: &str) -> Vec<GpuDevice> {
    let starts: Vec<usize> = IOREG_NODE.find_iter(text).map(|m| m.start()).collect();
    let mut devices = Vec::new();
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let block = &text[*start..end];
        let capture = |re: &Regex| {
            re.captures(block)
                .and_then(|c| c[1].parse::<f64>().ok())
                .map(Percentage::from_f64)
        };
        let Some(utilization) = capture(&GPU_DEVICE_UTIL) else { continue };
        let name = IOREG_MODEL
            .captures(block)
            .map(|c| c[1].to_string())
            .or_else(|| IOREG_NODE.captures(block).map(|c| c[1].to_string()))
            .unwrap_or_else(|| format!("GPU {}", devices.len()));
        devices.push(GpuDevice {
            name,
            utilization,
            renderer: capture(&GPU_RENDERER_UTIL),
            tiler: capture(&GPU_TILER_UTIL),
        });
    }
    devices
}

/// Sums the byte counters of every `IOBlockStorageDriver`
pub fn ioreg_block_storage(text: &str) -> Result<DiskIoCounters> {
    let sum = |re: &Regex| -> Result<u64> {
        re.captures_iter(text).map(|c| parse_u64(&c[1], "block storage bytes")).sum()
    };
    if !BLOCK_BYTES_READ.is_match(text) {
        return Err(Error::invalid_data("no IOBlockStorageDriver statistics"));
    }
    Ok(DiskIoCounters {
        read_bytes: sum(&BLOCK_BYTES_READ)?,
        write_bytes: sum(&BLOCK_BYTES_WRITE)?,
    })
}

/// `system_profiler SPBluetoothDataType -json`
pub fn system_profiler_bluetooth(json: &str) -> Result<Vec<BluetoothDevice>> {
    let root: Value = serde_json::from_str(json)?;
    let controllers = root
        .get("SPBluetoothDataType")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::invalid_data("SPBluetoothDataType missing"))?;

    let mut devices = Vec::new();
    for controller in controllers {
        for (section, connected) in [("device_connected", true), ("device_not_connected", false)] {
            let Some(entries) = controller.get(section).and_then(Value::as_array) else { continue };
            for entry in entries.iter().filter_map(Value::as_object) {
                for (name, props) in entry {
                    devices.push(bluetooth_device(name, props, connected));
                }
            }
        }
    }
    Ok(devices)
}

fn bluetooth_device(name: &str, props: &Value, connected: bool) -> BluetoothDevice {
    let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
    let batteries = [
        ("device_batteryLevelMain", "main"),
        ("device_batteryLevel", "main"),
        ("device_batteryLevelLeft", "left"),
        ("device_batteryLevelRight", "right"),
        ("device_batteryLevelCase", "case"),
    ]
    .into_iter()
    .filter_map(|(key, component)| {
        let level = props.get(key)?.as_str()?.trim_end_matches('%').trim().parse::<f64>().ok()?;
        Some(DeviceBattery { component: component.to_string(), level: Percentage::from_f64(level) })
    })
    .collect();

    BluetoothDevice {
        name: name.to_string(),
        address: text("device_address"),
        kind: text("device_minorType"),
        connected,
        batteries,
    }
}

use std::time::SystemTime;

use serde::Serialize;

use crate::core::{
    metrics::Series,
    types::{Percentage, Temperature},
};

/// Cumulative scheduler ticks spent in each CPU state
///
/// Counters only ever grow (until they wrap), so usage is always computed
/// from the difference between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTicks {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub nice: u64,
}

impl CpuTicks {
    pub fn new(user: u64, system: u64, idle: u64, nice: u64) -> Self {
        Self { user, system, idle, nice }
    }

    /// Sum over all states
    pub fn total(&self) -> u64 {
        self.user.saturating_add(self.system).saturating_add(self.idle).saturating_add(self.nice)
    }

    /// Ticks elapsed since `previous`, per state
    ///
    /// Mach reports 32-bit counters, so a counter that went backwards from a
    /// value that fits in `u32` has wrapped and the delta is taken modulo 2^32.
    pub fn since(&self, previous: &CpuTicks) -> CpuTicks {
        CpuTicks {
            user: counter_delta(self.user, previous.user),
            system: counter_delta(self.system, previous.system),
            idle: counter_delta(self.idle, previous.idle),
            nice: counter_delta(self.nice, previous.nice),
        }
    }

    /// Converts a tick window into usage percentages.
    ///
    /// Each state is its share of the window's total. Nice time is user time
    /// at lower priority and is counted as user, so the three shares always
    /// add up to 100. An empty window reads as fully idle.
    pub fn load(&self) -> CpuLoad {
        let total = self.total() as f64;
        if total <= 0.0 {
            return CpuLoad::idle();
        }
        let user = Percentage::of((self.user + self.nice) as f64, total);
        let system = Percentage::of(self.system as f64, total);
        let idle = Percentage::from_f64(100.0 - user.as_f64() - system.as_f64());
        CpuLoad { user, system, idle }
    }
}

fn counter_delta(now: u64, before: u64) -> u64 {
    match now.checked_sub(before) {
        Some(delta) => delta,
        None if before <= u64::from(u32::MAX) => u64::from((now as u32).wrapping_sub(before as u32)),
        // a wider counter going backwards was reset
        None => 0,
    }
}

impl std::ops::Add for CpuTicks {
    type Output = CpuTicks;

    fn add(self, rhs: Self) -> Self::Output {
        CpuTicks {
            user: self.user.saturating_add(rhs.user),
            system: self.system.saturating_add(rhs.system),
            idle: self.idle.saturating_add(rhs.idle),
            nice: self.nice.saturating_add(rhs.nice),
        }
    }
}

/// Usage split of one tick window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuLoad {
    pub user: Percentage,
    pub system: Percentage,
    pub idle: Percentage,
}

impl CpuLoad {
    pub fn new(user: Percentage, system: Percentage, idle: Percentage) -> Self {
        Self { user, system, idle }
    }

    pub fn idle() -> Self {
        Self::new(Percentage::from_f64(0.0), Percentage::from_f64(0.0), Percentage::from_f64(100.0))
    }

    /// Busy share, `100 - idle`
    pub fn total(&self) -> Percentage {
        Percentage::from_f64(self.user.as_f64() + self.system.as_f64())
    }
}

/// 1, 5 and 15 minute run-queue averages
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// One CPU sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuReading {
    /// Whole-package usage
    pub load: CpuLoad,
    /// Busy share of each logical core, in core order
    pub per_core: Vec<Percentage>,
    pub frequency_mhz: Option<f64>,
    pub temperature: Option<Temperature>,
    pub load_average: Option<LoadAverage>,
    pub captured_at: SystemTime,
}

impl CpuReading {
    pub fn total_usage(&self) -> Percentage {
        self.load.total()
    }

    pub fn series(&self) -> Vec<Series> {
        let mut series = vec![
            ("usage", self.total_usage().as_f64()),
            ("system", self.load.system.as_f64()),
            ("user", self.load.user.as_f64()),
            ("idle", self.load.idle.as_f64()),
        ];
        if let Some(temperature) = self.temperature {
            series.push(("temperature", temperature.as_celsius()));
        }
        if let Some(frequency) = self.frequency_mhz {
            series.push(("frequency", frequency));
        }
        if let Some(load_average) = self.load_average {
            series.push(("load_1m", load_average.one));
        }
        series
    }
}

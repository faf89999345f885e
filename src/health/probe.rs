use std::fs;

use itertools::Itertools;
use log::debug;

const PROC_STAT: &str = "/proc/stat";
const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Host metrics collaborator queried by the health sampler.
///
/// Calls always return a value; probes absorb sensing failures internally
/// and fall back to the last reading (0.0 before the first success).
pub trait HealthProbe {
    fn cpu_usage_percent(&mut self) -> f64;
    fn cpu_temp_degc(&mut self) -> f64;
}

/// Reads CPU usage from `/proc/stat` tick deltas and the CPU temperature
/// from the first thermal zone, the way the board's own health tooling does.
#[derive(Debug, Default)]
pub struct ProcfsProbe {
    prev: Option<CpuTimes>,
    last_usage: f64,
    last_temp: f64,
}

impl ProcfsProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HealthProbe for ProcfsProbe {
    fn cpu_usage_percent(&mut self) -> f64 {
        let now = match fs::read_to_string(PROC_STAT) {
            Ok(stat) => parse_cpu_times(&stat),
            Err(e) => {
                debug!("Failed to read {PROC_STAT}: {e}");
                None
            }
        };

        if let Some(now) = now {
            // Usage is defined over an interval, so the first reading
            // only seeds the reference point.
            if let Some(prev) = self.prev.replace(now) {
                if let Some(usage) = now.usage_since(prev) {
                    self.last_usage = usage;
                }
            }
        }

        self.last_usage
    }

    fn cpu_temp_degc(&mut self) -> f64 {
        match fs::read_to_string(THERMAL_ZONE) {
            Ok(raw) => match parse_millidegrees(&raw) {
                Some(degc) => self.last_temp = degc,
                None => debug!("Unparseable thermal zone reading: '{}'", raw.trim()),
            },
            Err(e) => debug!("Failed to read {THERMAL_ZONE}: {e}"),
        }

        self.last_temp
    }
}

/// Aggregate CPU tick counters from the first `/proc/stat` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

impl CpuTimes {
    fn usage_since(&self, prev: CpuTimes) -> Option<f64> {
        let total = self.total.saturating_sub(prev.total);
        let busy = self.busy.saturating_sub(prev.busy);

        if total == 0 {
            None
        } else {
            Some(100.0 * busy as f64 / total as f64)
        }
    }
}

fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let fields = stat.lines().next()?.strip_prefix("cpu ")?;

    let ticks: Result<Vec<u64>, _> = fields
        .split_whitespace()
        .map(|tok| tok.parse::<u64>())
        .try_collect();
    let ticks = ticks.ok()?;

    if ticks.len() < 4 {
        return None;
    }

    // user nice system idle iowait irq softirq ...; idle time is
    // idle + iowait, everything else counts as busy.
    let total: u64 = ticks.iter().sum();
    let idle = ticks[3] + ticks.get(4).copied().unwrap_or(0);

    Some(CpuTimes {
        busy: total - idle,
        total,
    })
}

fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().map(|milli| milli / 1000.0)
}

/// Probe returning constant readings.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct FixedProbe {
    pub usage: f64,
    pub temp: f64,
}

#[cfg(test)]
impl HealthProbe for FixedProbe {
    fn cpu_usage_percent(&mut self) -> f64 {
        self.usage
    }

    fn cpu_temp_degc(&mut self) -> f64 {
        self.temp
    }
}

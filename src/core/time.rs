use std::ops::{Add, AddAssign, Sub, SubAssign};

use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;

static PROCESS_START: Lazy<std::time::Instant> = Lazy::new(std::time::Instant::now);

pub trait Clock {
    fn utc(&self) -> UtcInstant;
    fn monotonic(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub utc: UtcInstant,
    pub monotonic: Instant,
}

impl Timestamp {
    pub fn now(clock: &dyn Clock) -> Timestamp {
        Timestamp {
            utc: clock.utc(),
            monotonic: clock.monotonic(),
        }
    }
}

/// Monotonic instant, expressed as the time elapsed since process start
/// (or since simulation start for a simulated clock).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct Instant {
    delta: TimeDelta,
}

impl Instant {
    pub fn elapsed(&self) -> TimeDelta {
        self.delta
    }

    pub fn elapsed_seconds_f64(&self) -> f64 {
        td_seconds(self.delta)
    }

    pub fn duration_since(&self, other: &Instant) -> TimeDelta {
        self.delta - other.delta
    }
}

impl Add<TimeDelta> for Instant {
    type Output = Instant;

    fn add(self, rhs: TimeDelta) -> Self::Output {
        Instant {
            delta: self.delta + rhs,
        }
    }
}

impl AddAssign<TimeDelta> for Instant {
    fn add_assign(&mut self, rhs: TimeDelta) {
        self.delta += rhs;
    }
}

impl Sub<TimeDelta> for Instant {
    type Output = Instant;
    fn sub(self, rhs: TimeDelta) -> Self::Output {
        Instant {
            delta: self.delta - rhs,
        }
    }
}

impl SubAssign<TimeDelta> for Instant {
    fn sub_assign(&mut self, rhs: TimeDelta) {
        self.delta -= rhs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UtcInstant {
    utc: DateTime<Utc>,
}

impl UtcInstant {
    pub fn duration_since(&self, other: UtcInstant) -> TimeDelta {
        self.utc - other.utc
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.utc - DateTime::<Utc>::UNIX_EPOCH
    }

    pub fn to_rfc3339(&self) -> String {
        self.utc.to_rfc3339()
    }
}

impl Add<TimeDelta> for UtcInstant {
    type Output = UtcInstant;

    fn add(self, rhs: TimeDelta) -> Self::Output {
        UtcInstant {
            utc: self.utc + rhs,
        }
    }
}

impl Sub<TimeDelta> for UtcInstant {
    type Output = UtcInstant;
    fn sub(self, rhs: TimeDelta) -> Self::Output {
        UtcInstant {
            utc: self.utc - rhs,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn utc(&self) -> UtcInstant {
        UtcInstant { utc: Utc::now() }
    }

    fn monotonic(&self) -> Instant {
        Instant {
            delta: TimeDelta::from_std(PROCESS_START.elapsed()).unwrap(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedClock {
    utc_epoch: DateTime<Utc>,
    elapsed: TimeDelta,
}

impl SimulatedClock {
    pub fn new(utc_epoch: DateTime<Utc>, elapsed: TimeDelta) -> SimulatedClock {
        SimulatedClock { utc_epoch, elapsed }
    }

    pub fn step(&mut self, delta: TimeDelta) {
        self.elapsed += delta
    }
}

impl Clock for SimulatedClock {
    fn utc(&self) -> UtcInstant {
        UtcInstant {
            utc: self.utc_epoch + self.elapsed,
        }
    }

    fn monotonic(&self) -> Instant {
        Instant {
            delta: self.elapsed,
        }
    }
}

pub fn td_seconds(td: TimeDelta) -> f64 {
    td.num_seconds() as f64 + (td.subsec_nanos() as f64) / 1000000000.0
}

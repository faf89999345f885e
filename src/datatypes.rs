use serde::Serialize;
use strum::AsRefStr;

use crate::core::time::Timestamp;

/// Value paired with the instant it was produced. Everything crossing a
/// channel in this crate is wrapped in one of these.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Timestamped<T>(pub Timestamp, pub T);

/// Barometric altitude data, accumulated line by line by the decoder.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AltitudeSample {
    pub temperature_degc: f64,
    pub pressure_pa: f64,
    pub altitude_m: f64,
}

/// GPS fix data. `fix_quality` and `satellites` come from the receiver as
/// small non-negative integers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GpsSample {
    pub fix: bool,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub geoid_height_m: f64,
    pub altitude_m: f64,
    pub speed: f64,
    pub fix_quality: u32,
    pub satellites: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OdometryRecord {
    pub altitude: AltitudeSample,
    pub gps: GpsSample,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HealthSample {
    pub cpu_usage_percent: f64,
    pub cpu_temp_degc: f64,
}

/// One odometry record paired with one health sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRecord {
    pub health: HealthSample,
    pub odometry: OdometryRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
pub enum TelemetrySource {
    #[strum(serialize = "odometry")]
    #[serde(rename = "odometry")]
    Odometry,

    #[strum(serialize = "health")]
    #[serde(rename = "health")]
    Health,
}

/// Raised link-degradation report: `source` has produced nothing for
/// `silent_ms` milliseconds (or has shut down, if `closed` is set).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedNotice {
    pub source: TelemetrySource,
    pub silent_ms: i64,
    pub closed: bool,
}

/// Unit delivered to the downstream sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownlinkFrame {
    Record(CombinedRecord),
    Degraded(DegradedNotice),
}

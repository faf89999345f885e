use anyhow::Result;
use serde::Serialize;

use crate::{
    config::SinkFormat,
    datatypes::{DegradedNotice, DownlinkFrame, Timestamped},
};

/// Downstream consumer of combined frames, standing in for the radio
/// transmitter. Receives frames in emission order, one at a time.
pub trait TelemetrySink {
    fn write(&mut self, frame: &Timestamped<DownlinkFrame>) -> Result<()>;
}

/// Prints each frame to stdout, either as a human-readable line or as one
/// JSON object per frame.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    format: SinkFormat,
}

impl ConsoleSink {
    pub fn new(format: SinkFormat) -> Self {
        Self { format }
    }
}

impl TelemetrySink for ConsoleSink {
    fn write(&mut self, frame: &Timestamped<DownlinkFrame>) -> Result<()> {
        let rendered = match self.format {
            SinkFormat::Text => format_text(frame),
            SinkFormat::Json => format_json(frame)?,
        };

        println!("{rendered}");
        Ok(())
    }
}

fn format_text(Timestamped(ts, frame): &Timestamped<DownlinkFrame>) -> String {
    let time = ts.utc.to_rfc3339();

    match frame {
        DownlinkFrame::Record(record) => {
            let health = &record.health;
            let alt = &record.odometry.altitude;
            let gps = &record.odometry.gps;

            format!(
                "{time} | cpu {:.1}% {:.1} C | alt {:.1} m ({:.1} C, {:.0} Pa) \
                 | gps fix={} lat={:.6} lon={:.6} alt={:.1} m speed={:.1} sats={} q={}",
                health.cpu_usage_percent,
                health.cpu_temp_degc,
                alt.altitude_m,
                alt.temperature_degc,
                alt.pressure_pa,
                if gps.fix { "Yes" } else { "No" },
                gps.latitude_deg,
                gps.longitude_deg,
                gps.altitude_m,
                gps.speed,
                gps.satellites,
                gps.fix_quality,
            )
        }
        DownlinkFrame::Degraded(notice) => format!("{time} | DEGRADED: {}", describe(notice)),
    }
}

fn describe(notice: &DegradedNotice) -> String {
    if notice.closed {
        format!(
            "{} source closed after {} ms of silence",
            notice.source.as_ref(),
            notice.silent_ms
        )
    } else {
        format!(
            "no {} data for {} ms",
            notice.source.as_ref(),
            notice.silent_ms
        )
    }
}

#[derive(Serialize)]
struct JsonFrame<'a> {
    time: String,
    #[serde(flatten)]
    frame: &'a DownlinkFrame,
}

fn format_json(Timestamped(ts, frame): &Timestamped<DownlinkFrame>) -> Result<String> {
    Ok(serde_json::to_string(&JsonFrame {
        time: ts.utc.to_rfc3339(),
        frame,
    })?)
}

/// Collects written frames for inspection.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    frames: std::sync::Arc<std::sync::Mutex<Vec<Timestamped<DownlinkFrame>>>>,
}

#[cfg(test)]
impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Timestamped<DownlinkFrame>> {
        self.frames.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TelemetrySink for VecSink {
    fn write(&mut self, frame: &Timestamped<DownlinkFrame>) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        core::time::{SimulatedClock, Timestamp},
        datatypes::{
            AltitudeSample, CombinedRecord, GpsSample, HealthSample, OdometryRecord,
            TelemetrySource,
        },
    };

    fn record_frame() -> Timestamped<DownlinkFrame> {
        let clock = SimulatedClock::new(DateTime::<Utc>::UNIX_EPOCH, TimeDelta::zero());

        Timestamped(
            Timestamp::now(&clock),
            DownlinkFrame::Record(CombinedRecord {
                health: HealthSample {
                    cpu_usage_percent: 12.34,
                    cpu_temp_degc: 48.25,
                },
                odometry: OdometryRecord {
                    altitude: AltitudeSample {
                        temperature_degc: 21.5,
                        pressure_pa: 101325.0,
                        altitude_m: 150.2,
                    },
                    gps: GpsSample {
                        fix: true,
                        latitude_deg: 37.1,
                        longitude_deg: -122.3,
                        geoid_height_m: -32.0,
                        altitude_m: 152.8,
                        speed: 1.4,
                        fix_quality: 2,
                        satellites: 7,
                    },
                },
            }),
        )
    }

    #[test]
    fn test_text_record_line() {
        let line = format_text(&record_frame());

        assert_eq!(
            line,
            "1970-01-01T00:00:00+00:00 | cpu 12.3% 48.2 C \
             | alt 150.2 m (21.5 C, 101325 Pa) \
             | gps fix=Yes lat=37.100000 lon=-122.300000 alt=152.8 m speed=1.4 sats=7 q=2"
        );
    }

    #[test]
    fn test_text_degraded_line() {
        let clock = SimulatedClock::new(DateTime::<Utc>::UNIX_EPOCH, TimeDelta::zero());

        let silent = Timestamped(
            Timestamp::now(&clock),
            DownlinkFrame::Degraded(DegradedNotice {
                source: TelemetrySource::Odometry,
                silent_ms: 5000,
                closed: false,
            }),
        );
        assert_eq!(
            format_text(&silent),
            "1970-01-01T00:00:00+00:00 | DEGRADED: no odometry data for 5000 ms"
        );

        let closed = Timestamped(
            Timestamp::now(&clock),
            DownlinkFrame::Degraded(DegradedNotice {
                source: TelemetrySource::Health,
                silent_ms: 1200,
                closed: true,
            }),
        );
        assert_eq!(
            format_text(&closed),
            "1970-01-01T00:00:00+00:00 | DEGRADED: health source closed after 1200 ms of silence"
        );
    }

    #[test]
    fn test_json_record_object() {
        let rendered: Value = serde_json::from_str(&format_json(&record_frame()).unwrap()).unwrap();

        assert_eq!(rendered["time"], "1970-01-01T00:00:00+00:00");
        assert_eq!(rendered["record"]["health"]["cpu_usage_percent"], 12.34);
        assert_eq!(
            rendered["record"]["odometry"]["altitude"]["altitude_m"],
            150.2
        );
        assert_eq!(rendered["record"]["odometry"]["gps"]["fix"], json!(true));
        assert_eq!(rendered["record"]["odometry"]["gps"]["satellites"], 7);
    }

    #[test]
    fn test_json_degraded_object() {
        let clock = SimulatedClock::new(DateTime::<Utc>::UNIX_EPOCH, TimeDelta::zero());

        let frame = Timestamped(
            Timestamp::now(&clock),
            DownlinkFrame::Degraded(DegradedNotice {
                source: TelemetrySource::Health,
                silent_ms: 5000,
                closed: false,
            }),
        );

        let rendered: Value = serde_json::from_str(&format_json(&frame).unwrap()).unwrap();

        assert_eq!(rendered["degraded"]["source"], "health");
        assert_eq!(rendered["degraded"]["silent_ms"], 5000);
        assert_eq!(rendered["degraded"]["closed"], json!(false));
    }
}

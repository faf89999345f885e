use std::io::BufRead;

use log::{debug, info};

use super::fields::{FieldUpdate, classify};
use crate::datatypes::{AltitudeSample, GpsSample, OdometryRecord};

/// Line accounting for one decoder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderStats {
    pub lines: u64,
    pub ignored: u64,
    pub malformed: u64,
    pub records: u64,
}

/// Folds field updates into odometry records.
///
/// Completion mirrors the wire protocol: an `Altitude:` line completes the
/// altitude half and a `Fix:` line completes the GPS half, regardless of
/// which other fields have been seen this cycle. A record is emitted as soon
/// as both halves are complete. Field values persist across emissions; only
/// the completion marks reset, so a field not re-sent in the next cycle
/// keeps its previous value.
#[derive(Debug, Default)]
pub struct RecordAssembler {
    altitude: AltitudeSample,
    gps: GpsSample,
    altitude_complete: bool,
    gps_complete: bool,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: FieldUpdate) -> Option<OdometryRecord> {
        match update {
            FieldUpdate::Temperature(v) => self.altitude.temperature_degc = v,
            FieldUpdate::Pressure(v) => self.altitude.pressure_pa = v,
            FieldUpdate::Altitude(v) => {
                self.altitude.altitude_m = v;
                self.altitude_complete = true;
            }
            FieldUpdate::Fix(v) => {
                self.gps.fix = v;
                self.gps_complete = true;
            }
            FieldUpdate::Latitude(v) => self.gps.latitude_deg = v,
            FieldUpdate::Longitude(v) => self.gps.longitude_deg = v,
            FieldUpdate::GeoidHeight(v) => self.gps.geoid_height_m = v,
            FieldUpdate::GpsAltitude(v) => self.gps.altitude_m = v,
            FieldUpdate::Speed(v) => self.gps.speed = v,
            FieldUpdate::FixQuality(v) => self.gps.fix_quality = v,
            FieldUpdate::Satellites(v) => self.gps.satellites = v,
        }

        if self.altitude_complete && self.gps_complete {
            self.altitude_complete = false;
            self.gps_complete = false;

            Some(OdometryRecord {
                altitude: self.altitude.clone(),
                gps: self.gps.clone(),
            })
        } else {
            None
        }
    }
}

/// Streaming decoder: reads protocol lines from `reader` and yields one
/// [`OdometryRecord`] per completion event. The sequence ends when the
/// source reaches end of file or fails; decoding is not restartable
/// mid-stream.
#[derive(Debug)]
pub struct OdometryDecoder<R> {
    reader: R,
    line: String,
    assembler: RecordAssembler,
    stats: DecoderStats,
    done: bool,
}

impl<R: BufRead> OdometryDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            assembler: RecordAssembler::new(),
            stats: DecoderStats::default(),
            done: false,
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn next_record(&mut self) -> std::io::Result<Option<OdometryRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }

            self.stats.lines += 1;
            let line = self.line.trim_end();

            let Some((tag, body)) = classify(line) else {
                self.stats.ignored += 1;
                continue;
            };

            match tag.parse(body) {
                Ok(update) => {
                    if let Some(record) = self.assembler.apply(update) {
                        self.stats.records += 1;
                        return Ok(Some(record));
                    }
                }
                Err(e) => {
                    self.stats.malformed += 1;
                    debug!("Skipping protocol line: {e}");
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for OdometryDecoder<R> {
    type Item = std::io::Result<OdometryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                let stats = self.stats;
                info!(
                    "Odometry stream closed: {} records from {} lines ({} ignored, {} malformed)",
                    stats.records, stats.lines, stats.ignored, stats.malformed
                );
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn decode_all(input: &str) -> (Vec<OdometryRecord>, DecoderStats) {
        let mut decoder = OdometryDecoder::new(Cursor::new(input.to_string()));
        let records: Vec<OdometryRecord> = decoder.by_ref().map(|r| r.unwrap()).collect();

        (records, decoder.stats())
    }

    #[test]
    fn test_complete_cycle() {
        let input = "Temperature: 21.5 C\n\
                     Pressure: 101325 Pa\n\
                     Altitude: 150.2 m\n\
                     Latitude: 37.1\n\
                     Longitude: -122.3\n\
                     Fix: Yes\n";

        let (records, stats) = decode_all(input);

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].altitude,
            AltitudeSample {
                temperature_degc: 21.5,
                pressure_pa: 101325.0,
                altitude_m: 150.2,
            }
        );
        assert!(records[0].gps.fix);
        assert_eq!(records[0].gps.latitude_deg, 37.1);
        assert_eq!(records[0].gps.longitude_deg, -122.3);

        assert_eq!(stats.records, 1);
        assert_eq!(stats.lines, 6);
        assert_eq!(stats.ignored, 0);
        assert_eq!(stats.malformed, 0);
    }

    #[test]
    fn test_fields_after_completion_belong_to_next_cycle() {
        // The Fix: line completes the GPS half, so latitude and longitude
        // sent after it only show up in the following record.
        let input = "Altitude: 150.2 m\n\
                     Fix: Yes\n\
                     Latitude: 37.1\n\
                     Longitude: -122.3\n\
                     Altitude: 151.0 m\n\
                     Fix: Yes\n";

        let (records, _) = decode_all(input);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].gps.latitude_deg, 0.0);
        assert_eq!(records[1].gps.latitude_deg, 37.1);
        assert_eq!(records[1].gps.longitude_deg, -122.3);
    }

    #[test]
    fn test_values_persist_across_records() {
        let input = "Temperature: 21.5 C\n\
                     Pressure: 101325 Pa\n\
                     Altitude: 150.2 m\n\
                     Fix: Yes\n\
                     Altitude: 155.0 m\n\
                     Fix: No\n";

        let (records, _) = decode_all(input);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].altitude.temperature_degc, 21.5);
        assert_eq!(records[1].altitude.pressure_pa, 101325.0);
        assert_eq!(records[1].altitude.altitude_m, 155.0);
        assert!(!records[1].gps.fix);
    }

    #[test]
    fn test_unrecognized_lines_ignored() {
        let input = "# boot banner\n\
                     Altitude: 150.2 m\n\
                     Heading: 12.0\n\
                     Fix: Yes\n";

        let (records, stats) = decode_all(input);

        assert_eq!(records.len(), 1);
        assert_eq!(stats.ignored, 2);
    }

    #[test]
    fn test_malformed_body_keeps_stale_value() {
        let input = "Temperature: 21.5 C\n\
                     Altitude: 150.2 m\n\
                     Fix: Yes\n\
                     Temperature: garbage C\n\
                     Altitude: 151.0 m\n\
                     Fix: Yes\n";

        let (records, stats) = decode_all(input);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].altitude.temperature_degc, 21.5);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn test_gps_fields_accumulate() {
        let input = "Latitude: 37.1\n\
                     Longitude: -122.3\n\
                     Geoid Height: -32.0\n\
                     AltitudeGPS: 152.8\n\
                     Speed: 1.4\n\
                     Fix Quality: 2\n\
                     Satellites: 7\n\
                     Fix: Yes\n\
                     Altitude: 150.2 m\n";

        let (records, _) = decode_all(input);

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].gps,
            GpsSample {
                fix: true,
                latitude_deg: 37.1,
                longitude_deg: -122.3,
                geoid_height_m: -32.0,
                altitude_m: 152.8,
                speed: 1.4,
                fix_quality: 2,
                satellites: 7,
            }
        );
    }

    #[test]
    fn test_no_partial_emission() {
        let input = "Temperature: 21.5 C\n\
                     Pressure: 101325 Pa\n\
                     Altitude: 150.2 m\n\
                     Latitude: 37.1\n";

        let (records, stats) = decode_all(input);

        assert_eq!(records.len(), 0);
        assert_eq!(stats.records, 0);
    }

    #[test]
    fn test_crlf_lines() {
        let input = "Altitude: 150.2 m\r\nFix: Yes\r\n";

        let (records, _) = decode_all(input);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].altitude.altitude_m, 150.2);
    }

    #[test]
    fn test_iterator_fused_after_eof() {
        let mut decoder = OdometryDecoder::new(Cursor::new("Altitude: 1\nFix: Yes\n"));

        assert!(decoder.next().is_some());
        assert!(decoder.next().is_none());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_assembler_emits_on_both_orders() {
        let mut assembler = RecordAssembler::new();

        assert!(assembler.apply(FieldUpdate::Fix(true)).is_none());
        assert!(assembler.apply(FieldUpdate::Altitude(10.0)).is_some());

        assert!(assembler.apply(FieldUpdate::Altitude(11.0)).is_none());
        assert!(assembler.apply(FieldUpdate::Fix(true)).is_some());
    }
}

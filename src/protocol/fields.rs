use strum::{AsRefStr, EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Recognized line prefix on the odometry wire protocol. The strum
/// serialization of each variant is the literal tag, including the colon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
pub enum FieldTag {
    #[strum(serialize = "Temperature:")]
    Temperature,
    #[strum(serialize = "Pressure:")]
    Pressure,
    #[strum(serialize = "Altitude:")]
    Altitude,
    #[strum(serialize = "Fix:")]
    Fix,
    #[strum(serialize = "Latitude:")]
    Latitude,
    #[strum(serialize = "Longitude:")]
    Longitude,
    #[strum(serialize = "Geoid Height:")]
    GeoidHeight,
    #[strum(serialize = "AltitudeGPS:")]
    GpsAltitude,
    #[strum(serialize = "Speed:")]
    Speed,
    #[strum(serialize = "Fix Quality:")]
    FixQuality,
    #[strum(serialize = "Satellites:")]
    Satellites,
}

/// A single decoded protocol line: one typed value for one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldUpdate {
    Temperature(f64),
    Pressure(f64),
    Altitude(f64),
    Fix(bool),
    Latitude(f64),
    Longitude(f64),
    GeoidHeight(f64),
    GpsAltitude(f64),
    Speed(f64),
    FixQuality(u32),
    Satellites(u32),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("field '{}' with unparseable body '{body}'", .tag.as_ref())]
pub struct FieldParseError {
    pub tag: FieldTag,
    pub body: String,
}

/// Splits a line into its field tag and the body following it. Lines that
/// start with no known tag are not part of the protocol and yield `None`.
pub fn classify(line: &str) -> Option<(FieldTag, &str)> {
    FieldTag::iter().find_map(|tag| line.strip_prefix(tag.as_ref()).map(|body| (tag, body)))
}

impl FieldTag {
    /// Parses the body that followed this tag. Numeric bodies may carry a
    /// trailing unit (`21.5 C`); only the first token is decoded. The `Fix:`
    /// body is true iff one of its tokens is `Yes`.
    pub fn parse(self, body: &str) -> Result<FieldUpdate, FieldParseError> {
        let update = match self {
            FieldTag::Temperature => FieldUpdate::Temperature(parse_float(self, body)?),
            FieldTag::Pressure => FieldUpdate::Pressure(parse_float(self, body)?),
            FieldTag::Altitude => FieldUpdate::Altitude(parse_float(self, body)?),
            FieldTag::Fix => FieldUpdate::Fix(body.split_whitespace().any(|token| token == "Yes")),
            FieldTag::Latitude => FieldUpdate::Latitude(parse_float(self, body)?),
            FieldTag::Longitude => FieldUpdate::Longitude(parse_float(self, body)?),
            FieldTag::GeoidHeight => FieldUpdate::GeoidHeight(parse_float(self, body)?),
            FieldTag::GpsAltitude => FieldUpdate::GpsAltitude(parse_float(self, body)?),
            FieldTag::Speed => FieldUpdate::Speed(parse_float(self, body)?),
            FieldTag::FixQuality => FieldUpdate::FixQuality(parse_int(self, body)?),
            FieldTag::Satellites => FieldUpdate::Satellites(parse_int(self, body)?),
        };

        Ok(update)
    }
}

fn parse_float(tag: FieldTag, body: &str) -> Result<f64, FieldParseError> {
    body.split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| FieldParseError {
            tag,
            body: body.trim().to_string(),
        })
}

fn parse_int(tag: FieldTag, body: &str) -> Result<u32, FieldParseError> {
    body.split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| FieldParseError {
            tag,
            body: body.trim().to_string(),
        })
}

use std::{fmt::Display, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// textual format of a capture instant, shared by every writer and reader
/// of the stored series.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("invalid input: {0}")]
pub struct InvalidInputError(pub String);

/// a monitored point, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = InvalidInputError;

    /// parses `"latitude,longitude"`. only finiteness is checked, the
    /// provider is left to reject out-of-range points.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.trim().split(',').collect::<Vec<_>>();
        match parts.as_slice() {
            [lat, lon] => Ok(Coordinate::new(
                parse_degrees(lat, "latitude")?,
                parse_degrees(lon, "longitude")?,
            )),
            _ => Err(InvalidInputError(format!(
                "expected latitude and longitude as numbers separated by a comma, got: '{}'",
                s.trim()
            ))),
        }
    }
}

fn parse_degrees(s: &str, name: &str) -> Result<f64, InvalidInputError> {
    let value = s
        .trim()
        .parse::<f64>()
        .map_err(|_| InvalidInputError(format!("{name} is not a number: '{}'", s.trim())))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InvalidInputError(format!("{name} must be finite, got: {value}")))
    }
}

/// one observation of traffic at a coordinate and instant. speeds are km/h,
/// travel time is seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub current_speed: f64,
    /// `0` when the provider had no baseline for the segment.
    pub free_flow_speed: f64,
    pub current_travel_time: f64,
}

impl Measurement {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// a measurement together with the surrogate id the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMeasurement {
    pub id: i64,
    pub measurement: Measurement,
}

/// measurements for one coordinate, in stored order.
pub type TrafficSeries = Vec<Measurement>;

pub mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(de::Error::custom)
    }
}

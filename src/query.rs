use chrono::NaiveDateTime;
use log::warn;
use serde::Deserialize;

use crate::{
    models::{Coordinate, Measurement, StoredMeasurement, TrafficSeries, TIMESTAMP_FORMAT},
    store::{Field, StoredRow},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("failure parsing stored row {row_id}, field '{field}': {reason}")]
pub struct ParseError {
    pub row_id: i64,
    pub field: &'static str,
    pub reason: String,
}

/// what to do with a stored row that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// the first bad row fails the whole read.
    #[default]
    Strict,
    /// bad rows are logged and left out.
    SkipInvalid,
}

pub fn parse_row(row: &StoredRow) -> Result<StoredMeasurement, ParseError> {
    let number = |field: &'static str, value: &Field| {
        value.as_f64().map_err(|reason| ParseError {
            row_id: row.id,
            field,
            reason,
        })
    };
    let timestamp = row
        .timestamp
        .as_text()
        .and_then(|text| {
            NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .map_err(|e| format!("'{text}' does not match '{TIMESTAMP_FORMAT}': {e}"))
        })
        .map_err(|reason| ParseError {
            row_id: row.id,
            field: "timestamp",
            reason,
        })?;
    let measurement = Measurement {
        latitude: number("latitude", &row.latitude)?,
        longitude: number("longitude", &row.longitude)?,
        timestamp,
        current_speed: number("current_speed", &row.current_speed)?,
        free_flow_speed: number("free_flow_speed", &row.free_flow_speed)?,
        current_travel_time: number("current_travel_time", &row.current_travel_time)?,
    };
    Ok(StoredMeasurement {
        id: row.id,
        measurement,
    })
}

/// parses the full stored history, keeping stored order.
pub fn parse_history(
    rows: Vec<StoredRow>,
    policy: RowPolicy,
) -> Result<Vec<StoredMeasurement>, ParseError> {
    match policy {
        RowPolicy::Strict => rows.iter().map(parse_row).collect(),
        RowPolicy::SkipInvalid => Ok(rows
            .iter()
            .filter_map(|row| match parse_row(row) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!("skipping {e}");
                    None
                }
            })
            .collect()),
    }
}

/// the series for `coordinate`. coordinates are compared with `==`, no
/// tolerance: `19.076` does not match a stored `19.0760001`.
pub fn filter_for(history: &[StoredMeasurement], coordinate: Coordinate) -> TrafficSeries {
    history
        .iter()
        .filter(|stored| {
            stored.measurement.latitude == coordinate.latitude
                && stored.measurement.longitude == coordinate.longitude
        })
        .map(|stored| stored.measurement.clone())
        .collect()
}

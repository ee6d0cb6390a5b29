use serde::Serialize;

use crate::models::StoredMeasurement;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("failure writing CSV: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
    #[error("failure flushing CSV: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// field names double as the header, matching the stored column names.
#[derive(Serialize)]
struct CsvRow {
    id: i64,
    latitude: f64,
    longitude: f64,
    timestamp: String,
    current_speed: f64,
    free_flow_speed: f64,
    current_travel_time: f64,
}

impl From<&StoredMeasurement> for CsvRow {
    fn from(stored: &StoredMeasurement) -> Self {
        let m = &stored.measurement;
        CsvRow {
            id: stored.id,
            latitude: m.latitude,
            longitude: m.longitude,
            timestamp: m.timestamp_text(),
            current_speed: m.current_speed,
            free_flow_speed: m.free_flow_speed,
            current_travel_time: m.current_travel_time,
        }
    }
}

/// UTF-8 CSV of `history` in the given order, header row first.
pub fn export_csv(history: &[StoredMeasurement]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(vec![]);
    if history.is_empty() {
        writer.write_record(HEADER)?;
    }
    for stored in history {
        writer.serialize(CsvRow::from(stored))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::from(e.into_error()))
}

pub const HEADER: [&str; 7] = [
    "id",
    "latitude",
    "longitude",
    "timestamp",
    "current_speed",
    "free_flow_speed",
    "current_travel_time",
];

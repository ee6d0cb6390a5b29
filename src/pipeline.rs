use std::time::Instant;

use chrono::{Local, NaiveDateTime, SubsecRound};
use log::{info, warn};

use crate::{
    error::TrafficError,
    models::{Coordinate, Measurement, StoredMeasurement},
    provider::TrafficProvider,
    store::MeasurementStore,
};

/// fetch, stamp and append one measurement per call. there is no retry and
/// no buffering: a failed append loses the fetched sample.
pub struct IngestionPipeline<P, S> {
    provider: P,
    store: S,
}

impl<P: TrafficProvider, S: MeasurementStore> IngestionPipeline<P, S> {
    pub fn new(provider: P, store: S) -> IngestionPipeline<P, S> {
        IngestionPipeline { provider, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn ingest(&self, coordinate: Coordinate) -> Result<StoredMeasurement, TrafficError> {
        let start = Instant::now();
        let raw = self.provider.fetch(coordinate).await?;
        info!("fetched flow data for {} in {:?}", coordinate, start.elapsed());

        let flow = raw.normalize();
        for field in &flow.defaulted {
            warn!("provider omitted {} for {}, stored as 0", field, coordinate);
        }
        let measurement = Measurement {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            timestamp: capture_timestamp(),
            current_speed: flow.current_speed,
            free_flow_speed: flow.free_flow_speed,
            current_travel_time: flow.current_travel_time,
        };
        let id = self.store.append(&measurement).await?;
        info!("stored measurement {} for {}", id, coordinate);
        Ok(StoredMeasurement { id, measurement })
    }
}

/// local wall-clock time truncated to whole seconds.
pub fn capture_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

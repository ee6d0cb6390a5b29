use log::error;

use crate::{
    classifier::{self, TrafficStatus},
    error::TrafficError,
    export,
    models::{Coordinate, Measurement, StoredMeasurement, TrafficSeries},
    pipeline::IngestionPipeline,
    provider::TrafficProvider,
    query::{filter_for, parse_history, RowPolicy},
    store::MeasurementStore,
};

/// entry points for a presentation layer. every call takes the coordinate it
/// works on; nothing is remembered between calls except what the store holds.
pub struct TrafficService<P, S> {
    pipeline: IngestionPipeline<P, S>,
    row_policy: RowPolicy,
}

impl<P: TrafficProvider, S: MeasurementStore> TrafficService<P, S> {
    pub fn new(provider: P, store: S, row_policy: RowPolicy) -> TrafficService<P, S> {
        TrafficService {
            pipeline: IngestionPipeline::new(provider, store),
            row_policy,
        }
    }

    pub fn store(&self) -> &S {
        self.pipeline.store()
    }

    /// one ingestion attempt, errors propagated.
    pub async fn ingest(&self, coordinate: Coordinate) -> Result<StoredMeasurement, TrafficError> {
        self.pipeline.ingest(coordinate).await
    }

    /// ingests and returns the new measurement, or `None` if any step failed.
    pub async fn fetch_live(&self, coordinate: Coordinate) -> Option<Measurement> {
        match self.pipeline.ingest(coordinate).await {
            Ok(stored) => Some(stored.measurement),
            Err(e) => {
                error!("live fetch for {} failed: {}", coordinate, e);
                None
            }
        }
    }

    /// every stored measurement, parsed under the configured row policy.
    pub async fn full_history(&self) -> Result<Vec<StoredMeasurement>, TrafficError> {
        let rows = self.store().all().await?;
        Ok(parse_history(rows, self.row_policy)?)
    }

    /// the series for `coordinate`, empty when it cannot be read.
    pub async fn fetch_history(&self, coordinate: Coordinate) -> TrafficSeries {
        match self.full_history().await {
            Ok(history) => filter_for(&history, coordinate),
            Err(e) => {
                error!("history for {} unavailable: {}", coordinate, e);
                vec![]
            }
        }
    }

    pub fn classify(&self, series: &[Measurement]) -> TrafficStatus {
        classifier::classify(series)
    }

    /// CSV of the full history, in stored order.
    pub async fn export_csv(&self) -> Result<Vec<u8>, TrafficError> {
        let history = self.full_history().await?;
        Ok(export::export_csv(&history)?)
    }
}

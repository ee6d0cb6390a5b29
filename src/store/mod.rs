mod postgrest_store;
mod row;
mod sqlite_store;

use std::future::Future;

pub use postgrest_store::PostgrestStore;
pub use row::{Field, StoredRow};
pub use sqlite_store::SqliteStore;

use crate::{
    configuration::{StoreBackend, StoreSettings},
    error::TrafficError,
    models::{Coordinate, Measurement, TrafficSeries},
    query::{filter_for, parse_history, RowPolicy},
};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("measurement store unavailable: {0}")]
    Unavailable(String),
    #[error("measurement store misconfigured: {0}")]
    Misconfigured(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Unavailable(value.to_string())
    }
}

/// append-only history of measurements. rows are never updated or deleted,
/// so concurrent appends need no coordination beyond what the engine provides.
pub trait MeasurementStore: Send + Sync {
    /// creates the relation when it does not exist yet. safe to repeat.
    fn ensure_schema(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// writes one row and returns its surrogate id.
    fn append(
        &self,
        measurement: &Measurement,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// every stored row, in insertion order.
    fn all(&self) -> impl Future<Output = Result<Vec<StoredRow>, StoreError>> + Send;

    /// rows whose coordinate equals `coordinate` exactly, strictly parsed.
    fn query(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<TrafficSeries, TrafficError>> + Send {
        async move {
            let rows = self.all().await?;
            let history = parse_history(rows, RowPolicy::Strict)?;
            Ok(filter_for(&history, coordinate))
        }
    }
}

/// table names are interpolated into statements and urls, so only plain
/// identifiers are accepted.
pub fn validate_table_name(table: &str) -> Result<(), StoreError> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::Misconfigured(format!(
            "invalid table name '{table}': expected letters, digits and underscores"
        )))
    }
}

/// the store selected by `store.backend`.
pub enum AnyStore {
    Sqlite(SqliteStore),
    Postgrest(PostgrestStore),
}

impl AnyStore {
    pub fn from_settings(settings: &StoreSettings) -> Result<AnyStore, StoreError> {
        match settings.backend {
            StoreBackend::Sqlite => {
                let sqlite = settings.sqlite.as_ref().ok_or_else(|| {
                    StoreError::Misconfigured(String::from("backend is sqlite but [store.sqlite] is missing"))
                })?;
                Ok(AnyStore::Sqlite(SqliteStore::open(&sqlite.path, &settings.table)?))
            }
            StoreBackend::Postgrest => {
                let postgrest = settings.postgrest.as_ref().ok_or_else(|| {
                    StoreError::Misconfigured(String::from(
                        "backend is postgrest but [store.postgrest] is missing",
                    ))
                })?;
                Ok(AnyStore::Postgrest(PostgrestStore::new(postgrest, &settings.table)?))
            }
        }
    }
}

impl MeasurementStore for AnyStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        match self {
            AnyStore::Sqlite(store) => store.ensure_schema().await,
            AnyStore::Postgrest(store) => store.ensure_schema().await,
        }
    }

    async fn append(&self, measurement: &Measurement) -> Result<i64, StoreError> {
        match self {
            AnyStore::Sqlite(store) => store.append(measurement).await,
            AnyStore::Postgrest(store) => store.append(measurement).await,
        }
    }

    async fn all(&self) -> Result<Vec<StoredRow>, StoreError> {
        match self {
            AnyStore::Sqlite(store) => store.all().await,
            AnyStore::Postgrest(store) => store.all().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("traffic_data").is_ok());
        assert!(validate_table_name("_t2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("traffic; DROP TABLE x").is_err());
    }
}

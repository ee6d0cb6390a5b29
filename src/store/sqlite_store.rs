use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use log::info;
use rusqlite::{params, Connection};

use super::{validate_table_name, Field, MeasurementStore, StoreError, StoredRow};
use crate::models::Measurement;

/// measurement history in a local SQLite file.
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
    table: String,
}

impl SqliteStore {
    pub fn open(path: &Path, table: &str) -> Result<SqliteStore, StoreError> {
        validate_table_name(table)?;
        let connection = Connection::open(path)?;
        info!("opened sqlite store at {}", path.display());
        Ok(SqliteStore::with_connection(connection, table))
    }

    pub fn open_in_memory(table: &str) -> Result<SqliteStore, StoreError> {
        validate_table_name(table)?;
        Ok(SqliteStore::with_connection(Connection::open_in_memory()?, table))
    }

    fn with_connection(connection: Connection, table: &str) -> SqliteStore {
        SqliteStore {
            connection: Arc::new(Mutex::new(connection)),
            table: table.to_string(),
        }
    }

    /// runs `op` on the blocking pool while holding the connection.
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> rusqlite::Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let conn = connection
                .lock()
                .map_err(|_| StoreError::Unavailable(String::from("sqlite connection poisoned")))?;
            op(&*conn, table.as_str()).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("sqlite worker failed: {e}")))?
    }
}

impl MeasurementStore for SqliteStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.run(|conn, table| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    latitude REAL,
                    longitude REAL,
                    timestamp TEXT,
                    current_speed REAL,
                    free_flow_speed REAL,
                    current_travel_time REAL
                );"
            ))
        })
        .await
    }

    async fn append(&self, measurement: &Measurement) -> Result<i64, StoreError> {
        let m = measurement.clone();
        self.run(move |conn, table| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (latitude, longitude, timestamp, current_speed, free_flow_speed, current_travel_time)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    m.latitude,
                    m.longitude,
                    m.timestamp_text(),
                    m.current_speed,
                    m.free_flow_speed,
                    m.current_travel_time
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn all(&self) -> Result<Vec<StoredRow>, StoreError> {
        self.run(|conn, table| {
            let mut statement = conn.prepare(&format!(
                "SELECT id, latitude, longitude, timestamp, current_speed, free_flow_speed, current_travel_time
                 FROM {table} ORDER BY id ASC"
            ))?;
            let rows = statement.query_map([], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    latitude: Field::from(row.get_ref(1)?),
                    longitude: Field::from(row.get_ref(2)?),
                    timestamp: Field::from(row.get_ref(3)?),
                    current_speed: Field::from(row.get_ref(4)?),
                    free_flow_speed: Field::from(row.get_ref(5)?),
                    current_travel_time: Field::from(row.get_ref(6)?),
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;

    fn measurement(latitude: f64, longitude: f64, at: &str, current_speed: f64) -> Measurement {
        Measurement {
            latitude,
            longitude,
            timestamp: NaiveDateTime::parse_from_str(at, TIMESTAMP_FORMAT).unwrap(),
            current_speed,
            free_flow_speed: 100.0,
            current_travel_time: 95.5,
        }
    }

    async fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory("traffic_data").unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = store().await;
        store.ensure_schema().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let store = store().await;
        let first = store
            .append(&measurement(19.076, 72.8777, "2024-03-01 08:00:00", 40.0))
            .await
            .unwrap();
        let second = store
            .append(&measurement(19.076, 72.8777, "2024-03-01 08:00:00", 40.0))
            .await
            .unwrap();
        assert!(second > first);
        assert_eq!(store.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_round_trip_through_query() {
        let store = store().await;
        let m = measurement(19.076, 72.8777, "2024-03-01 08:15:42", 41.3);
        store.append(&m).await.unwrap();
        store
            .append(&measurement(19.0761, 72.8777, "2024-03-01 08:16:00", 10.0))
            .await
            .unwrap();
        let series = store.query(Coordinate::new(19.076, 72.8777)).await.unwrap();
        assert_eq!(series, vec![m]);
    }

    #[tokio::test]
    async fn test_rows_come_back_in_insertion_order() {
        let store = store().await;
        for (i, at) in ["2024-03-01 08:00:00", "2024-03-01 07:00:00", "2024-03-01 09:00:00"]
            .iter()
            .enumerate()
        {
            store
                .append(&measurement(1.0, 2.0, at, i as f64))
                .await
                .unwrap();
        }
        let speeds = store
            .query(Coordinate::new(1.0, 2.0))
            .await
            .unwrap()
            .iter()
            .map(|m| m.current_speed)
            .collect::<Vec<_>>();
        assert_eq!(speeds, vec![0.0, 1.0, 2.0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends() {
        let store = Arc::new(store().await);
        let handles = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .append(&measurement(1.0, 2.0, "2024-03-01 08:00:00", i as f64))
                        .await
                        .unwrap()
                })
            })
            .collect::<Vec<_>>();
        let mut ids = vec![];
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);

        let rows = store.all().await.unwrap();
        assert_eq!(rows.len(), 16);
        assert!(rows.windows(2).all(|w| w[0].id < w[1].id));
        let mut speeds = store
            .query(Coordinate::new(1.0, 2.0))
            .await
            .unwrap()
            .iter()
            .map(|m| m.current_speed as i64)
            .collect::<Vec<_>>();
        speeds.sort();
        assert_eq!(speeds, (0..16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_append_without_schema_is_unavailable() {
        let store = SqliteStore::open_in_memory("traffic_data").unwrap();
        let result = store
            .append(&measurement(1.0, 2.0, "2024-03-01 08:00:00", 1.0))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_raw_text_values_are_returned_unparsed() {
        let store = store().await;
        store
            .run(|conn, table| {
                conn.execute(
                    &format!(
                        "INSERT INTO {table} (latitude, longitude, timestamp, current_speed, free_flow_speed, current_travel_time)
                         VALUES (1.0, 2.0, '01/03/2024 08:00', 'fast', 50, NULL)"
                    ),
                    [],
                )
            })
            .await
            .unwrap();
        let rows = store.all().await.unwrap();
        assert_eq!(rows[0].timestamp, Field::Text(String::from("01/03/2024 08:00")));
        assert_eq!(rows[0].current_speed, Field::Text(String::from("fast")));
        // REAL affinity stores 50 as a real
        assert_eq!(rows[0].free_flow_speed, Field::Real(50.0));
        assert_eq!(rows[0].current_travel_time, Field::Null);
        assert!(store.query(Coordinate::new(1.0, 2.0)).await.is_err());
    }
}

use log::{debug, error, info};
use postgrest::Postgrest;
use secrecy::ExposeSecret;

use super::{validate_table_name, MeasurementStore, StoreError, StoredRow};
use crate::{configuration::PostgrestSettings, models::Measurement};

/// measurement history in a relation served over PostgREST (e.g. Supabase).
/// the relation has to exist already, PostgREST cannot create it.
pub struct PostgrestStore {
    client: Postgrest,
    table: String,
}

impl PostgrestStore {
    pub fn new(settings: &PostgrestSettings, table: &str) -> Result<PostgrestStore, StoreError> {
        validate_table_name(table)?;
        let client = Postgrest::new(settings.uri.clone())
            .insert_header("apikey", settings.key.expose_secret())
            .insert_header(
                "Authorization",
                format!("Bearer {}", settings.key.expose_secret()),
            );
        Ok(PostgrestStore {
            client,
            table: table.to_string(),
        })
    }
}

/// body of a successful response, or the status and body of a failed one.
async fn response_body(response: reqwest::Response) -> Result<String, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    if status.is_success() {
        Ok(body)
    } else {
        error!("Error in query status: {} -> {}", status, body);
        Err(StoreError::Unavailable(format!("HTTP {status}: {body}")))
    }
}

/// rows requested per round trip. the server may return fewer.
const PAGE_SIZE: usize = 1000;

/// total from a `Content-Range` value such as `0-999/4213`; `None` for `*`.
fn content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.parse().ok()
}

fn parse_rows(body: &str) -> Result<Vec<StoredRow>, StoreError> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(body)
        .map_err(|e| StoreError::Unavailable(format!("unexpected response body: {e}")))?;
    rows.iter()
        .map(|row| StoredRow::from_json(row).map_err(StoreError::Unavailable))
        .collect()
}

impl MeasurementStore for PostgrestStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .from(&self.table)
            .select("id")
            .limit(1)
            .execute()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        response_body(response).await?;
        info!("relation {} is reachable", self.table);
        Ok(())
    }

    async fn append(&self, measurement: &Measurement) -> Result<i64, StoreError> {
        let row = serde_json::to_string(measurement)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let response = self
            .client
            .from(&self.table)
            .insert(row)
            .execute()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let body = response_body(response).await?;
        match parse_rows(&body)?.as_slice() {
            [inserted] => Ok(inserted.id),
            other => Err(StoreError::Unavailable(format!(
                "expected one inserted row, found {}",
                other.len()
            ))),
        }
    }

    /// pages through the relation with `Range` requests. servers cap a
    /// single response at `db-max-rows`, so one unranged select is not enough.
    async fn all(&self) -> Result<Vec<StoredRow>, StoreError> {
        let mut rows = vec![];
        loop {
            let from = rows.len();
            let response = self
                .client
                .from(&self.table)
                .select("*")
                .order("id.asc")
                .range(from, from + PAGE_SIZE - 1)
                .execute()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            // offset past the end of the relation
            if response.status().as_u16() == 416 {
                break;
            }
            let total = response
                .headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total);
            let page = parse_rows(&response_body(response).await?)?;
            if page.is_empty() {
                break;
            }
            debug!("read rows {}..{} of {}", from, from + page.len(), self.table);
            rows.extend(page);
            if total.is_some_and(|total| rows.len() >= total) {
                break;
            }
        }
        Ok(rows)
    }
}

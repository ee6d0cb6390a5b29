use std::fmt::Display;

use rusqlite::types::ValueRef;

/// a column value exactly as the storage engine returned it. coercion into
/// typed measurements happens when the history is parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Field {
    /// numeric coercion: numbers pass through, text must parse as a float.
    pub fn as_f64(&self) -> Result<f64, String> {
        match self {
            Field::Integer(i) => Ok(*i as f64),
            Field::Real(r) => Ok(*r),
            Field::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("could not convert '{s}' to float")),
            Field::Null => Err(String::from("value is null")),
        }
    }

    pub fn as_text(&self) -> Result<&str, String> {
        match self {
            Field::Text(s) => Ok(s.as_str()),
            other => Err(format!("expected text, found {other}")),
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Null => write!(f, "null"),
            Field::Integer(i) => write!(f, "integer {i}"),
            Field::Real(r) => write!(f, "real {r}"),
            Field::Text(s) => write!(f, "text '{s}'"),
        }
    }
}

impl From<ValueRef<'_>> for Field {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Field::Null,
            ValueRef::Integer(i) => Field::Integer(i),
            ValueRef::Real(r) => Field::Real(r),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Field::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }
}

impl From<Option<&serde_json::Value>> for Field {
    fn from(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Field::Null,
            Some(serde_json::Value::Number(n)) => match n.as_i64() {
                Some(i) => Field::Integer(i),
                None => n.as_f64().map(Field::Real).unwrap_or(Field::Null),
            },
            Some(serde_json::Value::String(s)) => Field::Text(s.clone()),
            Some(other) => Field::Text(other.to_string()),
        }
    }
}

/// one row of the traffic relation, `id` plus the six measurement columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: i64,
    pub latitude: Field,
    pub longitude: Field,
    pub timestamp: Field,
    pub current_speed: Field,
    pub free_flow_speed: Field,
    pub current_travel_time: Field,
}

impl StoredRow {
    /// reads a row object from a JSON response body. a row without an
    /// integer `id` is not one of ours.
    pub fn from_json(row: &serde_json::Map<String, serde_json::Value>) -> Result<StoredRow, String> {
        let id = row
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| format!("row has no integer id: {}", serde_json::Value::Object(row.clone())))?;
        Ok(StoredRow {
            id,
            latitude: Field::from(row.get("latitude")),
            longitude: Field::from(row.get("longitude")),
            timestamp: Field::from(row.get("timestamp")),
            current_speed: Field::from(row.get("current_speed")),
            free_flow_speed: Field::from(row.get("free_flow_speed")),
            current_travel_time: Field::from(row.get("current_travel_time")),
        })
    }
}

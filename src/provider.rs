use std::{future::Future, time::Duration};

use log::debug;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::{configuration::ProviderSettings, models::Coordinate};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("API request failed with HTTP status {status}: {body}")]
    Request { status: u16, body: String },
    #[error("API request timed out after {0:?}")]
    Timeout(Duration),
    #[error("API request failed: {0}")]
    Transport(String),
    #[error("no traffic data found in the API response")]
    DataMissing,
    #[error("failure decoding API response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// true for the network/HTTP failure family, false for payload problems.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ProviderError::Request { .. } | ProviderError::Timeout(_) | ProviderError::Transport(_)
        )
    }
}

/// a source of flow data for a single coordinate.
pub trait TrafficProvider: Send + Sync {
    fn fetch(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<RawProviderRecord, ProviderError>> + Send;
}

/// flow fields as the provider reported them; `None` when omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProviderRecord {
    pub current_speed: Option<f64>,
    pub free_flow_speed: Option<f64>,
    pub current_travel_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFlow {
    pub current_speed: f64,
    pub free_flow_speed: f64,
    pub current_travel_time: f64,
    /// names of the fields that were omitted and replaced by `0`.
    pub defaulted: Vec<&'static str>,
}

impl RawProviderRecord {
    /// replaces omitted fields with `0`. a `0` free-flow speed therefore means
    /// "baseline unknown", and the caller is told which fields defaulted.
    pub fn normalize(&self) -> NormalizedFlow {
        let mut defaulted = vec![];
        let mut or_zero = |value: Option<f64>, name: &'static str| {
            value.unwrap_or_else(|| {
                defaulted.push(name);
                0.0
            })
        };
        let current_speed = or_zero(self.current_speed, "currentSpeed");
        let free_flow_speed = or_zero(self.free_flow_speed, "freeFlowSpeed");
        let current_travel_time = or_zero(self.current_travel_time, "currentTravelTime");
        NormalizedFlow {
            current_speed,
            free_flow_speed,
            current_travel_time,
            defaulted,
        }
    }
}

#[derive(Deserialize)]
struct FlowResponse {
    #[serde(rename = "flowSegmentData")]
    flow_segment_data: Option<serde_json::Value>,
}

/// interprets a provider response. anything but HTTP 200 is a request failure,
/// and a 200 without a non-empty `flowSegmentData` object carries no data.
pub fn parse_flow_response(status: u16, body: &str) -> Result<RawProviderRecord, ProviderError> {
    if status != 200 {
        return Err(ProviderError::Request {
            status,
            body: body.to_string(),
        });
    }
    let response: FlowResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))?;
    match response.flow_segment_data {
        Some(serde_json::Value::Object(data)) if !data.is_empty() => {
            serde_json::from_value(serde_json::Value::Object(data))
                .map_err(|e| ProviderError::Decode(e.to_string()))
        }
        _ => Err(ProviderError::DataMissing),
    }
}

/// client for the TomTom flow segment API (absolute speeds).
pub struct TomTomClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    zoom: u8,
    timeout: Duration,
}

impl TomTomClient {
    pub fn new(settings: &ProviderSettings) -> Result<TomTomClient, ProviderError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(TomTomClient {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            zoom: settings.zoom,
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/traffic/services/4/flowSegmentData/absolute/{}/json",
            self.base_url, self.zoom
        )
    }

    fn transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            // the url carries the api key
            ProviderError::Transport(error.without_url().to_string())
        }
    }
}

impl TrafficProvider for TomTomClient {
    async fn fetch(&self, coordinate: Coordinate) -> Result<RawProviderRecord, ProviderError> {
        let point = coordinate.to_string();
        debug!("GET {}?key=<redacted>&point={}", self.endpoint(), point);
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("key", self.api_key.expose_secret().as_str()),
                ("point", point.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_flow_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{serve, silent, Reply, Request};
    use serde_json::json;

    #[test]
    fn test_parse_flow_response() {
        let body = json!({
            "flowSegmentData": {
                "frc": "FRC2",
                "currentSpeed": 41,
                "freeFlowSpeed": 56.5,
                "currentTravelTime": 230,
                "freeFlowTravelTime": 168,
                "confidence": 0.97
            }
        });
        let record = parse_flow_response(200, &body.to_string()).unwrap();
        assert_eq!(
            record,
            RawProviderRecord {
                current_speed: Some(41.0),
                free_flow_speed: Some(56.5),
                current_travel_time: Some(230.0),
            }
        );
    }

    #[test]
    fn test_non_success_status_is_request_error() {
        let error = parse_flow_response(500, "internal error").unwrap_err();
        assert_eq!(
            error,
            ProviderError::Request {
                status: 500,
                body: String::from("internal error"),
            }
        );
        assert!(error.is_request_error());
    }

    #[test]
    fn test_missing_flow_data() {
        for body in [json!({}), json!({ "flowSegmentData": null }), json!({ "flowSegmentData": {} })] {
            let error = parse_flow_response(200, &body.to_string()).unwrap_err();
            assert_eq!(error, ProviderError::DataMissing);
            assert!(!error.is_request_error());
        }
    }

    #[test]
    fn test_non_json_body() {
        let error = parse_flow_response(200, "<html></html>").unwrap_err();
        assert!(matches!(error, ProviderError::Decode(_)));
    }

    #[test]
    fn test_normalize_defaults_missing_fields_to_zero() {
        let body = json!({ "flowSegmentData": { "currentSpeed": 30 } });
        let flow = parse_flow_response(200, &body.to_string())
            .unwrap()
            .normalize();
        assert_eq!(flow.current_speed, 30.0);
        assert_eq!(flow.free_flow_speed, 0.0);
        assert_eq!(flow.current_travel_time, 0.0);
        assert_eq!(flow.defaulted, vec!["freeFlowSpeed", "currentTravelTime"]);
    }

    fn settings_for(base_url: String, timeout_secs: u64) -> ProviderSettings {
        ProviderSettings {
            base_url,
            api_key: Secret::new(String::from("k")),
            zoom: 10,
            timeout_secs,
        }
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out_as_request_error() {
        let client = TomTomClient::new(&settings_for(silent().await, 1)).unwrap();
        let error = client
            .fetch(Coordinate::new(19.076, 72.8777))
            .await
            .unwrap_err();
        assert_eq!(error, ProviderError::Timeout(Duration::from_secs(1)));
        assert!(error.is_request_error());
    }

    #[tokio::test]
    async fn test_fetch_sends_key_and_point() {
        let base_url = serve(|request: &Request| {
            let body = if request.target.starts_with(
                "/traffic/services/4/flowSegmentData/absolute/10/json?key=k&point=19.076%2C72.8777",
            ) {
                json!({ "flowSegmentData": { "currentSpeed": 41, "freeFlowSpeed": 56, "currentTravelTime": 230 } })
            } else {
                json!({})
            };
            Reply {
                status: "200 OK",
                headers: vec![("content-type", String::from("application/json"))],
                body: body.to_string(),
            }
        })
        .await;
        let client = TomTomClient::new(&settings_for(base_url, 5)).unwrap();
        let record = client.fetch(Coordinate::new(19.076, 72.8777)).await.unwrap();
        assert_eq!(record.current_speed, Some(41.0));
        assert_eq!(record.free_flow_speed, Some(56.0));
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let base_url = serve(|_: &Request| Reply {
            status: "500 Internal Server Error",
            headers: vec![],
            body: String::from("boom"),
        })
        .await;
        let client = TomTomClient::new(&settings_for(base_url, 5)).unwrap();
        let error = client.fetch(Coordinate::new(1.0, 2.0)).await.unwrap_err();
        assert_eq!(
            error,
            ProviderError::Request {
                status: 500,
                body: String::from("boom"),
            }
        );
    }

    #[test]
    fn test_endpoint() {
        let settings = ProviderSettings {
            base_url: String::from("https://api.tomtom.com/"),
            api_key: Secret::new(String::from("k")),
            zoom: 10,
            timeout_secs: 5,
        };
        let client = TomTomClient::new(&settings).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://api.tomtom.com/traffic/services/4/flowSegmentData/absolute/10/json"
        );
    }
}

//! HTTP forecaster. Talks to a model server hosting a pretrained
//! probabilistic forecaster (e.g. `amazon/chronos-2`).
//!
//! Protocol:
//! - `POST {base_url}/predict` with the context rows, future rows, quantile
//!   levels, and column bindings as JSON; the response is an array of wire
//!   rows (see [`crate::wire`]), optionally wrapped as `{"forecast": [...]}`.
//! - `GET {base_url}/health` for health checks.

use async_trait::async_trait;
use gapfill_core::error::ForecastError;
use gapfill_core::forecast::{ForecastRequest, Forecaster, QuantileForecast};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::wire;

/// A forecaster backed by a remote model server.
pub struct HttpForecaster {
    name: String,
    base_url: String,
    model: String,
    device: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpForecaster {
    /// Create a new HTTP forecaster.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ForecastError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForecastError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "http".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            device: "cpu".into(),
            api_key: None,
            timeout,
            client,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the JSON request body.
    fn to_api_body(&self, request: &ForecastRequest) -> Value {
        let bindings = &request.bindings;
        let target = bindings.target.column();

        let context: Vec<Value> = request
            .context
            .rows
            .iter()
            .map(|r| {
                let mut obj = Map::new();
                obj.insert(
                    bindings.timestamp_column.clone(),
                    json!(wire::format_timestamp(&r.timestamp)),
                );
                obj.insert(target.to_string(), json!(r.value));
                obj.insert(bindings.id_column.clone(), json!(r.series_id));
                Value::Object(obj)
            })
            .collect();

        let future: Vec<Value> = request
            .future
            .rows
            .iter()
            .map(|r| {
                let mut obj = Map::new();
                obj.insert(
                    bindings.timestamp_column.clone(),
                    json!(wire::format_timestamp(&r.timestamp)),
                );
                obj.insert(bindings.id_column.clone(), json!(r.series_id));
                Value::Object(obj)
            })
            .collect();

        let levels: Vec<f64> = request.quantile_levels.iter().map(|l| l.value()).collect();

        json!({
            "model": self.model,
            "device_map": self.device,
            "context": context,
            "future": future,
            "prediction_length": request.prediction_length,
            "quantile_levels": levels,
            "id_column": bindings.id_column,
            "timestamp_column": bindings.timestamp_column,
            "target": target,
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> ForecastError {
        if e.is_timeout() {
            ForecastError::Timeout(format!(
                "no response from {} within {}s",
                self.base_url,
                self.timeout.as_secs()
            ))
        } else {
            ForecastError::Network(e.to_string())
        }
    }
}

/// Seconds to wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Read a delta-seconds `Retry-After` header. HTTP-date values fall back to
/// the default.
fn retry_after(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[async_trait]
impl Forecaster for HttpForecaster {
    fn name(&self) -> &str {
        &self.name
    }

    async fn forecast(
        &self,
        request: ForecastRequest,
    ) -> std::result::Result<QuantileForecast, ForecastError> {
        let url = format!("{}/predict", self.base_url);
        let body = self.to_api_body(&request);

        debug!(
            forecaster = %self.name,
            model = %self.model,
            series = %request.target(),
            context_rows = request.context.len(),
            prediction_length = request.prediction_length,
            "Sending forecast request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ForecastError::RateLimited {
                retry_after_secs: retry_after(response.headers()),
            });
        }

        if status == 401 || status == 403 {
            return Err(ForecastError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Forecaster returned error");
            if request.context.is_empty() {
                return Err(ForecastError::EmptyContext(error_body));
            }
            return Err(ForecastError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let payload: Value = response.json().await.map_err(|e| ForecastError::ApiError {
            status_code: status,
            message: format!("Failed to parse response: {e}"),
        })?;

        let rows = wire::parse_rows(&payload, &request.bindings)?;

        let returned = wire::union_labels(&rows);
        for level in &request.quantile_levels {
            if !returned.contains(level) {
                warn!(level = %level, series = %request.target(), "Requested quantile level missing from forecast");
            }
        }

        Ok(QuantileForecast::new(request.target(), rows))
    }

    async fn health_check(&self) -> std::result::Result<bool, ForecastError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(response.status().is_success())
    }
}

//! Backend selection: builds the configured forecaster.

use std::sync::Arc;
use std::time::Duration;

use gapfill_config::AppConfig;
use gapfill_core::error::ForecastError;
use gapfill_core::forecast::Forecaster;
use tracing::info;

use crate::http::HttpForecaster;
use crate::replay::ReplayForecaster;

/// Build the forecaster named by `forecaster.backend`.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Forecaster>, ForecastError> {
    let fc = &config.forecaster;
    let forecaster: Arc<dyn Forecaster> = match fc.backend.as_str() {
        "http" => {
            info!(base_url = %fc.base_url, model = %fc.model, "Using HTTP forecaster");
            Arc::new(
                HttpForecaster::new(&fc.base_url, &fc.model, Duration::from_secs(fc.timeout_secs))?
                    .with_api_key(fc.api_key.clone())
                    .with_device(&fc.device),
            )
        }
        "replay" => {
            info!(dir = %fc.replay_dir.display(), "Using replay forecaster");
            Arc::new(ReplayForecaster::new(&fc.replay_dir))
        }
        other => {
            return Err(ForecastError::NotConfigured(format!(
                "unknown forecaster backend '{other}'"
            )));
        }
    };
    Ok(forecaster)
}

//! A whole `gapfill run`: load the inputs, reconcile both targets, and write
//! the output table. Every step is recorded on the run's trace.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gapfill_config::AppConfig;
use gapfill_core::error::{Error, Result};
use gapfill_core::forecast::Forecaster;
use gapfill_core::series::{Dataset, Target};
use gapfill_core::stage::Stage;
use gapfill_forecasters::ReplayForecaster;
use gapfill_forecasters::replay::write_forecast_csv;
use gapfill_telemetry::{TelemetryError, TraceRecorder};
use tracing::{info, warn};

use crate::plot::PlotlyJsonPresenter;
use crate::runner::{ChoiceTables, Pipeline, PipelineSettings, RunOutcome};
use crate::table::{read_choices, read_dataset, write_atomic, write_dataset};

/// Command-line overrides for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write the run trace as JSON here, whether or not the run succeeds.
    pub trace: Option<PathBuf>,
    /// Save each target's verified forecast here for later replay.
    pub save_forecasts: Option<PathBuf>,
    /// Replaces `data.output`.
    pub output: Option<PathBuf>,
    /// Write figures even when `plots.enabled` is off.
    pub plots: bool,
}

impl RunOptions {
    pub fn output_path<'a>(&'a self, config: &'a AppConfig) -> &'a Path {
        self.output.as_deref().unwrap_or(&config.data.output)
    }
}

/// Read the original dataset and both choice tables named by the config.
pub async fn load_inputs(config: &AppConfig) -> Result<(Dataset, ChoiceTables)> {
    let dataset = read_dataset(&config.data.original).await?;
    let choices = ChoiceTables {
        hare: read_choices(config.data.choices(Target::Hare)).await?,
        lynx: read_choices(config.data.choices(Target::Lynx)).await?,
    };
    Ok((dataset, choices))
}

/// Run the pipeline end to end and write the reconciled table.
///
/// The output is written only after both passes succeed. The trace, when
/// requested, is written either way; a trace write failure after a failed
/// run is logged and the run's own error returned.
pub async fn run_to_file(
    config: &AppConfig,
    forecaster: Arc<dyn Forecaster>,
    opts: &RunOptions,
    recorder: &Arc<TraceRecorder>,
) -> Result<RunOutcome> {
    let result = execute(config, forecaster, opts, recorder).await;
    recorder.end();

    if let Some(path) = &opts.trace {
        match write_trace(path, recorder).await {
            Ok(()) => info!(path = %path.display(), "Wrote run trace"),
            Err(e) if result.is_err() => warn!(error = %e, "Failed to write run trace"),
            Err(e) => return Err(e),
        }
    }

    result
}

async fn write_trace(path: &Path, recorder: &TraceRecorder) -> Result<()> {
    let json = recorder.to_json().map_err(|e| match e {
        TelemetryError::SerdeError(e) => Error::Serialization(e),
        other => Error::Internal(other.to_string()),
    })?;
    write_atomic(path, json.as_bytes()).await
}

async fn execute(
    config: &AppConfig,
    forecaster: Arc<dyn Forecaster>,
    opts: &RunOptions,
    recorder: &Arc<TraceRecorder>,
) -> Result<RunOutcome> {
    let mut settings = PipelineSettings::try_from(&config.pipeline)?;
    settings.show_gaps = config.plots.show_gaps;

    let span = recorder.start(Stage::Load, "inputs");
    let (dataset, choices) = match load_inputs(config).await {
        Ok(inputs) => {
            record(recorder.finish(&span, Some(inputs.0.len())));
            inputs
        }
        Err(e) => {
            record(recorder.fail(&span, &e.to_string()));
            return Err(e);
        }
    };
    info!(
        rows = dataset.len(),
        hare_choices = choices.hare.len(),
        lynx_choices = choices.lynx.len(),
        "Loaded inputs"
    );

    let mut pipeline = Pipeline::new(forecaster, settings).with_recorder(recorder.clone());
    if config.plots.enabled || opts.plots {
        pipeline = pipeline.with_presenter(Arc::new(PlotlyJsonPresenter::new(&config.plots.dir)));
    }

    let outcome = pipeline.reconcile(&dataset, &choices).await?;

    if let Some(dir) = &opts.save_forecasts {
        for pass in &outcome.passes {
            let bindings = pipeline.settings().bindings(pass.target);
            let bytes = write_forecast_csv(&pass.forecast.rows, &bindings)?;
            let path = ReplayForecaster::table_path(dir, pass.target);
            write_atomic(&path, &bytes).await?;
            info!(series = %pass.target, path = %path.display(), "Saved forecast");
        }
    }

    let output = opts.output_path(config);
    let span = recorder.start(Stage::Write, output.display().to_string());
    let written = match write_dataset(&outcome.table.table) {
        Ok(bytes) => write_atomic(output, &bytes).await,
        Err(e) => Err(e),
    };
    match &written {
        Ok(()) => record(recorder.finish(&span, Some(outcome.table.table.len()))),
        Err(e) => record(recorder.fail(&span, &e.to_string())),
    }
    written?;

    Ok(outcome)
}

fn record(result: std::result::Result<(), TelemetryError>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to record stage span");
    }
}

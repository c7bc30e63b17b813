//! `gapfill forecast`: call the configured forecaster once and save the
//! table so later runs can replay it.

use std::path::{Path, PathBuf};

use gapfill_forecasters::replay::write_forecast_csv;
use gapfill_forecasters::{ReplayForecaster, build_from_config};
use gapfill_pipeline::table::{read_dataset, write_atomic};
use gapfill_pipeline::{Pipeline, PipelineSettings};

use super::{CliResult, load_config, parse_target};

pub async fn run(config_path: Option<&Path>, target: &str, out: Option<PathBuf>) -> CliResult {
    let target = parse_target(target)?;
    let config = load_config(config_path)?;
    let settings = PipelineSettings::try_from(&config.pipeline)?;
    let bindings = settings.bindings(target);
    let dataset = read_dataset(&config.data.original).await?;

    let forecaster = build_from_config(&config)?;
    let pipeline = Pipeline::new(forecaster, settings);
    let (context, future) = pipeline.frames(&dataset, target)?;
    let forecast = pipeline.forecast(context, future).await?;

    let out = out.unwrap_or_else(|| ReplayForecaster::table_path(&config.forecaster.replay_dir, target));
    let bytes = write_forecast_csv(&forecast.rows, &bindings)?;
    write_atomic(&out, &bytes).await?;

    println!(
        "📈 {target}: {} forecast rows saved to {}",
        forecast.len(),
        out.display()
    );
    Ok(())
}

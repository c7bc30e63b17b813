//! `gapfill frames`: print what the forecaster would receive.

use std::path::Path;

use gapfill_pipeline::PipelineSettings;
use gapfill_pipeline::frames::{build_context, build_future};
use gapfill_pipeline::table::read_dataset;
use serde_json::json;

use super::{CliResult, load_config, parse_target};

pub async fn run(config_path: Option<&Path>, target: &str) -> CliResult {
    let target = parse_target(target)?;
    let config = load_config(config_path)?;
    let settings = PipelineSettings::try_from(&config.pipeline)?;
    let dataset = read_dataset(&config.data.original).await?;

    let context = build_context(&dataset, target, &settings.series_id)?;
    let future = build_future(&settings.range, &settings.series_id)?;

    let doc = json!({
        "target": target,
        "series_id": settings.series_id,
        "bindings": settings.bindings(target),
        "prediction_length": future.len(),
        "quantile_levels": settings.quantile_levels,
        "context": context.rows,
        "future": future.rows,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

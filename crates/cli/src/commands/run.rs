//! `gapfill run`: impute both series and write the reconciled table.

use std::path::Path;
use std::sync::Arc;

use gapfill_forecasters::build_from_config;
use gapfill_pipeline::{RunOptions, run_to_file};
use gapfill_telemetry::TraceRecorder;
use tracing::error;

use super::{CliResult, load_config};

pub async fn run(config_path: Option<&Path>, opts: RunOptions) -> CliResult {
    let config = load_config(config_path)?;
    let forecaster = build_from_config(&config)?;
    let recorder = Arc::new(TraceRecorder::new());

    let outcome = match run_to_file(&config, forecaster, &opts, &recorder).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(stage = ?e.stage(), "Run failed: {e}");
            return Err(e.into());
        }
    };

    let trace = recorder.snapshot();
    println!("✅ Reconciled dataset written to {}", opts.output_path(&config).display());
    println!("   Original rows: {}", outcome.table.original_rows);
    println!("   Imputed rows:  {}", outcome.table.imputed_rows());
    for pass in &outcome.passes {
        println!(
            "   {:<5} forecast {} rows, {} selected, {} with a value",
            pass.target.column(),
            pass.forecast.len(),
            pass.selected.len(),
            pass.selected.defined()
        );
    }
    println!("   Took {} ms", trace.total_duration_ms());
    Ok(())
}

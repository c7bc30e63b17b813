//! `gapfill doctor`: diagnose inputs and forecaster health.

use std::path::Path;

use gapfill_config::AppConfig;
use gapfill_core::series::Target;
use gapfill_forecasters::build_from_config;
use gapfill_pipeline::table::{read_choices, read_dataset};

use super::CliResult;

pub async fn run(config_path: Option<&Path>) -> CliResult {
    println!("🩺 gapfill Doctor: System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config before running other checks.");
            return Ok(());
        }
    };

    match read_dataset(&config.data.original).await {
        Ok(dataset) => {
            let known = |t: Target| dataset.observations(t).filter(|o| o.value.is_some()).count();
            println!(
                "  ✅ Original dataset: {} rows ({} Hare, {} Lynx values)",
                dataset.len(),
                known(Target::Hare),
                known(Target::Lynx)
            );
        }
        Err(e) => {
            println!("  ❌ Original dataset: {e}");
            issues += 1;
        }
    }

    for target in Target::ALL {
        match read_choices(config.data.choices(target)).await {
            Ok(choice) => {
                println!(
                    "  ✅ {target} choices: {} years ({} with a quantile)",
                    choice.len(),
                    choice.defined()
                );
            }
            Err(e) => {
                println!("  ❌ {target} choices: {e}");
                issues += 1;
            }
        }
    }

    match build_from_config(&config) {
        Ok(forecaster) => match forecaster.health_check().await {
            Ok(true) => println!("  ✅ Forecaster '{}' healthy", forecaster.name()),
            Ok(false) => {
                println!("  ⚠️  Forecaster '{}' reports unhealthy", forecaster.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Forecaster '{}' unreachable: {e}", forecaster.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Forecaster not configured: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

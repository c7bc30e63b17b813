//! `gapfill config`: configuration management commands.

use std::path::{Path, PathBuf};

use gapfill_config::AppConfig;

use super::CliResult;

fn resolve(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_path)
}

pub async fn validate(config_path: Option<&Path>) -> CliResult {
    println!("🔍 Validating configuration...");

    match AppConfig::load(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.data.original.exists() {
                warnings.push(format!(
                    "Original dataset not found: {}",
                    config.data.original.display()
                ));
            }
            for target in gapfill_core::series::Target::ALL {
                let path = config.data.choices(target);
                if !path.exists() {
                    warnings.push(format!("{target} choice table not found: {}", path.display()));
                }
            }
            if config.forecaster.backend == "replay" && !config.forecaster.replay_dir.is_dir() {
                warnings.push(format!(
                    "Replay directory not found: {}",
                    config.forecaster.replay_dir.display()
                ));
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Backend:   {}", config.forecaster.backend);
            println!("   Model:     {}", config.forecaster.model);
            println!(
                "   Range:     {}..={}",
                config.pipeline.impute_start, config.pipeline.impute_end
            );
            println!("   Series id: {}", config.pipeline.series_id);
            println!("   Levels:    {:?}", config.pipeline.quantile_levels);
            println!("   Output:    {}", config.data.output.display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> CliResult {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> CliResult {
    println!("{}", resolve(config_path).display());
    Ok(())
}

pub async fn init(config_path: Option<&Path>, force: bool) -> CliResult {
    let path = resolve(config_path);
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("📝 Wrote default configuration to {}", path.display());
    Ok(())
}

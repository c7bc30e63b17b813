pub mod config_cmd;
pub mod doctor;
pub mod forecast;
pub mod frames;
pub mod run;

use std::path::Path;

use gapfill_config::AppConfig;
use gapfill_core::series::Target;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Parse a `--target` argument.
pub fn parse_target(raw: &str) -> CliResult<Target> {
    Ok(raw.parse::<Target>()?)
}

/// Load the config with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}").into())
}

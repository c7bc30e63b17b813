//! End-to-end integration tests for the gapfill pipeline.
//!
//! These tests drive the whole flow from CSV inputs on disk to the
//! reconciled output file, with a scripted in-memory forecaster standing in
//! for the model server.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Datelike;
use gapfill_config::AppConfig;
use gapfill_core::error::{Error, ForecastError};
use gapfill_core::forecast::{
    ForecastRequest, ForecastRow, Forecaster, QuantileCell, QuantileForecast, QuantileLevel,
};
use gapfill_core::series::{Target, Year};
use gapfill_core::stage::Stage;
use gapfill_forecasters::{ReplayForecaster, build_from_config};
use gapfill_pipeline::{RunOptions, RunOutcome, run_to_file};
use gapfill_telemetry::{RunTrace, TraceRecorder};

// ── Mock Forecaster ──────────────────────────────────────────────────────

/// A forecaster with a fixed median per (target, year) and symmetric
/// quantiles around it. Records which targets it was asked for.
struct ScriptedForecaster {
    levels: Vec<f64>,
    calls: Mutex<Vec<Target>>,
}

impl ScriptedForecaster {
    fn new(levels: &[f64]) -> Self {
        Self {
            levels: levels.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn median(target: Target, year: Year) -> f64 {
        match target {
            Target::Hare => f64::from(year - 1895),
            Target::Lynx => f64::from(year - 1930) * 1.5,
        }
    }

    fn calls(&self) -> Vec<Target> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Forecaster for ScriptedForecaster {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn forecast(&self, request: ForecastRequest) -> Result<QuantileForecast, ForecastError> {
        let target = request.target();
        self.calls.lock().unwrap().push(target);
        if request.context.is_empty() {
            return Err(ForecastError::EmptyContext("no history".into()));
        }
        let rows = request
            .future
            .rows
            .iter()
            .map(|f| {
                let median = Self::median(target, f.timestamp.year());
                ForecastRow::new(
                    f.timestamp,
                    f.series_id.clone(),
                    target.column(),
                    Some(median),
                    self.levels
                        .iter()
                        .map(|&p| QuantileCell {
                            level: QuantileLevel::new(p).unwrap(),
                            value: Some(median + (p - 0.5) * 20.0),
                        })
                        .collect(),
                )
            })
            .collect();
        Ok(QuantileForecast::new(target, rows))
    }
}

const ALL_LEVELS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

// ── Fixtures ─────────────────────────────────────────────────────────────

fn original_csv() -> String {
    let mut text = String::from("Year,Hare,Lynx\n");
    for year in 1900..=1935 {
        let lynx = if year == 1910 { String::new() } else { (year % 7).to_string() };
        text.push_str(&format!("{year},{},{lynx}\n", 20 + year % 13));
    }
    text
}

fn choices_csv(rows: &[(Year, &str)]) -> String {
    let mut text = String::from("Year,chosen_quantile\n");
    for (year, label) in rows {
        text.push_str(&format!("{year},{label}\n"));
    }
    text
}

/// Write inputs and a config pointing at them; returns the loaded config.
fn workspace(dir: &Path, hare: &[(Year, &str)], lynx: &[(Year, &str)], extra: &str) -> AppConfig {
    std::fs::write(dir.join("original.csv"), original_csv()).unwrap();
    std::fs::write(dir.join("hare.csv"), choices_csv(hare)).unwrap();
    std::fs::write(dir.join("lynx.csv"), choices_csv(lynx)).unwrap();

    let config = format!(
        r#"
[data]
original = "{d}/original.csv"
hare_choices = "{d}/hare.csv"
lynx_choices = "{d}/lynx.csv"
output = "{d}/out/output.csv"

[pipeline]
impute_start = 1936
impute_end = 1940

[forecaster]
replay_dir = "{d}/forecasts"
{extra}
"#,
        d = dir.display()
    );
    let path = dir.join("gapfill.toml");
    std::fs::write(&path, config).unwrap();
    AppConfig::load_from(&path).unwrap()
}

/// Drive a whole run with default options.
async fn run(config: &AppConfig, forecaster: Arc<dyn Forecaster>) -> Result<RunOutcome, Error> {
    run_with(config, forecaster, &RunOptions::default()).await.0
}

async fn run_with(
    config: &AppConfig,
    forecaster: Arc<dyn Forecaster>,
    opts: &RunOptions,
) -> (Result<RunOutcome, Error>, RunTrace) {
    let recorder = Arc::new(TraceRecorder::new());
    let result = run_to_file(config, forecaster, opts, &recorder).await;
    (result, recorder.snapshot())
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_chosen_year_imputed_unchosen_year_absent() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(dir.path(), &[(1937, "0.5")], &[(1937, "0.5")], "");
    let forecaster = Arc::new(ScriptedForecaster::new(&ALL_LEVELS));

    let outcome = run(&config, forecaster.clone()).await.unwrap();
    assert_eq!(forecaster.calls(), vec![Target::Hare, Target::Lynx]);

    let text = std::fs::read_to_string(&config.data.output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Year,Hare,Lynx");
    // Lynx median for 1937 is 10.5, truncated to 10.
    assert_eq!(lines.last().copied(), Some("1937,42,10"));
    assert_eq!(lines.len(), 1 + 36 + 1);
    assert!(!text.contains("\n1938,"));
    assert_eq!(outcome.table.imputed_rows(), 1);
}

#[tokio::test]
async fn e2e_original_rows_are_preserved_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(
        dir.path(),
        &[(1936, "0.1"), (1937, "nan"), (1938, "0.9")],
        &[(1936, "0.3"), (1937, "0.7"), (1938, "")],
        "",
    );

    run(&config, Arc::new(ScriptedForecaster::new(&ALL_LEVELS)))
        .await
        .unwrap();

    let text = std::fs::read_to_string(&config.data.output).unwrap();
    let expected_prefix = original_csv();
    assert!(text.starts_with(&expected_prefix));
    let imputed: Vec<&str> = text[expected_prefix.len()..].lines().collect();
    assert_eq!(imputed.len(), 3);
    assert!(imputed[1].starts_with("1937,,"));
    assert!(imputed[2].ends_with(','));
}

#[tokio::test]
async fn e2e_failed_lynx_pass_writes_trace_but_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(dir.path(), &[(1936, "0.5")], &[(1937, "0.7")], "");
    let levels = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.8, 0.9];
    let opts = RunOptions {
        trace: Some(dir.path().join("trace.json")),
        ..RunOptions::default()
    };

    let (result, trace) =
        run_with(&config, Arc::new(ScriptedForecaster::new(&levels)), &opts).await;
    let err = result.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Select));
    let msg = err.to_string();
    assert!(msg.contains("Lynx"));
    assert!(msg.contains("'0.7'"));
    assert!(!config.data.output.exists());

    assert!(trace.spans.iter().all(|s| s.stage != Stage::Write));
    let failed = trace.failed_span().unwrap();
    assert_eq!((failed.stage, failed.label.as_str()), (Stage::Select, "Lynx"));

    let saved: RunTrace =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("trace.json")).unwrap())
            .unwrap();
    assert!(saved.ended_at.is_some());
    assert_eq!(saved.failed_span().unwrap().stage, Stage::Select);
}

#[tokio::test]
async fn e2e_saved_forecast_replays_to_identical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(
        dir.path(),
        &[(1936, "0.2"), (1939, "0.6"), (1940, "0.8")],
        &[(1936, "0.4"), (1939, "none"), (1940, "0.5")],
        "",
    );
    let opts = RunOptions {
        save_forecasts: Some(config.forecaster.replay_dir.clone()),
        ..RunOptions::default()
    };

    run_with(&config, Arc::new(ScriptedForecaster::new(&ALL_LEVELS)), &opts)
        .await
        .0
        .unwrap();
    let live_bytes = std::fs::read(&config.data.output).unwrap();
    for target in Target::ALL {
        assert!(ReplayForecaster::table_path(&config.forecaster.replay_dir, target).is_file());
    }

    let replay = Arc::new(ReplayForecaster::new(&config.forecaster.replay_dir));
    assert!(replay.health_check().await.unwrap());
    run(&config, replay).await.unwrap();

    assert_eq!(std::fs::read(&config.data.output).unwrap(), live_bytes);
}

#[tokio::test]
async fn e2e_output_override_replaces_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(dir.path(), &[(1936, "0.5")], &[(1936, "0.5")], "");
    let elsewhere: PathBuf = dir.path().join("elsewhere").join("imputed.csv");
    let opts = RunOptions {
        output: Some(elsewhere.clone()),
        ..RunOptions::default()
    };
    assert_eq!(opts.output_path(&config), elsewhere.as_path());

    let (result, trace) =
        run_with(&config, Arc::new(ScriptedForecaster::new(&ALL_LEVELS)), &opts).await;
    result.unwrap();

    assert!(elsewhere.is_file());
    assert!(!config.data.output.exists());
    let write = trace.spans.iter().find(|s| s.stage == Stage::Write).unwrap();
    assert_eq!(write.label, elsewhere.display().to_string());
}

#[tokio::test]
async fn e2e_config_selects_replay_backend() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(
        dir.path(),
        &[(1936, "0.5")],
        &[(1936, "0.5")],
        "backend = \"replay\"",
    );
    let forecaster = build_from_config(&config).unwrap();
    assert_eq!(forecaster.name(), "replay");

    // No saved tables yet: the Hare pass fails in the forecast stage.
    let err = run(&config, forecaster).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Forecast));
    assert!(matches!(
        err,
        Error::Pass {
            target: Target::Hare,
            ..
        }
    ));
    assert!(!config.data.output.exists());
}

#[tokio::test]
async fn e2e_trace_records_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(dir.path(), &[(1936, "0.5")], &[(1936, "0.5")], "");

    let (result, trace) = run_with(
        &config,
        Arc::new(ScriptedForecaster::new(&ALL_LEVELS)),
        &RunOptions::default(),
    )
    .await;
    result.unwrap();

    assert!(trace.failed_span().is_none());
    for stage in [
        Stage::Load,
        Stage::Pass,
        Stage::FrameBuild,
        Stage::Forecast,
        Stage::Select,
        Stage::Merge,
        Stage::Write,
    ] {
        assert!(
            trace.spans.iter().any(|s| s.stage == stage),
            "missing span for {stage}"
        );
    }
    assert_eq!(trace.rows_by_stage(Stage::Load), vec![("inputs".to_string(), 36)]);
    assert_eq!(
        trace.rows_by_stage(Stage::Select),
        vec![("Hare".to_string(), 1), ("Lynx".to_string(), 1)]
    );
    assert_eq!(
        trace.rows_by_stage(Stage::Write),
        vec![(config.data.output.display().to_string(), 37)]
    );
    let roots: Vec<Stage> = trace
        .spans
        .iter()
        .filter(|s| s.parent_id.is_none())
        .map(|s| s.stage)
        .collect();
    assert_eq!(
        roots,
        vec![Stage::Load, Stage::Pass, Stage::Pass, Stage::Merge, Stage::Write]
    );
}

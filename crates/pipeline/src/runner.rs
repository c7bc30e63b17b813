//! Runs both target passes and reconciles them into the output table.

use std::sync::Arc;

use gapfill_config::{ConfigError, PipelineConfig};
use gapfill_core::choice::QuantileChoice;
use gapfill_core::error::{Error, Result};
use gapfill_core::forecast::{ForecastRequest, Forecaster, QuantileForecast, QuantileLevel};
use gapfill_core::frame::{ColumnBindings, ContextFrame, FutureFrame, YearRange};
use gapfill_core::present::Presenter;
use gapfill_core::series::{Dataset, Target};
use gapfill_core::stage::Stage;
use gapfill_telemetry::TraceRecorder;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::frames::{build_context, build_future};
use crate::merge::{
    ImputedColumn, ReconciledTable, cast_counts, combine_targets, concat_relaxed, join_choices,
    unmatched_years,
};
use crate::plot;
use crate::select::{SelectedSeries, select_quantiles};

/// Per-run parameters shared by both passes.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub range: YearRange,
    pub series_id: String,
    pub quantile_levels: Vec<QuantileLevel>,
    pub id_column: String,
    pub timestamp_column: String,
    /// Keep null imputed years as gaps in figures.
    pub show_gaps: bool,
}

impl PipelineSettings {
    pub fn bindings(&self, target: Target) -> ColumnBindings {
        ColumnBindings::new(target).with_columns(&self.id_column, &self.timestamp_column)
    }
}

impl TryFrom<&PipelineConfig> for PipelineSettings {
    type Error = ConfigError;

    fn try_from(config: &PipelineConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            range: config.impute_range()?,
            series_id: config.series_id.clone(),
            quantile_levels: config.levels()?,
            id_column: config.id_column.clone(),
            timestamp_column: config.timestamp_column.clone(),
            show_gaps: true,
        })
    }
}

/// The quantile-choice table of each target.
#[derive(Debug, Clone, Default)]
pub struct ChoiceTables {
    pub hare: QuantileChoice,
    pub lynx: QuantileChoice,
}

impl ChoiceTables {
    pub fn get(&self, target: Target) -> &QuantileChoice {
        match target {
            Target::Hare => &self.hare,
            Target::Lynx => &self.lynx,
        }
    }
}

/// Everything one target pass produced.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub target: Target,
    /// The forecaster's verified answer, before the choice join.
    pub forecast: QuantileForecast,
    pub selected: SelectedSeries,
    pub imputed: ImputedColumn,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub table: ReconciledTable,
    pub passes: Vec<PassOutcome>,
}

impl RunOutcome {
    pub fn pass(&self, target: Target) -> Option<&PassOutcome> {
        self.passes.iter().find(|p| p.target == target)
    }
}

/// The reconciliation pipeline.
pub struct Pipeline {
    forecaster: Arc<dyn Forecaster>,
    settings: PipelineSettings,
    presenter: Option<Arc<dyn Presenter>>,
    recorder: Option<Arc<TraceRecorder>>,
}

impl Pipeline {
    pub fn new(forecaster: Arc<dyn Forecaster>, settings: PipelineSettings) -> Self {
        Self {
            forecaster,
            settings,
            presenter: None,
            recorder: None,
        }
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<TraceRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Open a span, nested under `parent` when given.
    fn span_start(&self, stage: Stage, label: &str, parent: Option<&str>) -> Option<String> {
        self.recorder.as_ref().map(|r| match parent {
            Some(parent) => r.start_child(parent, stage, label),
            None => r.start(stage, label),
        })
    }

    fn span_end<T>(&self, span: Option<&str>, result: &Result<T>, rows: impl FnOnce(&T) -> usize) {
        let (Some(recorder), Some(id)) = (&self.recorder, span) else {
            return;
        };
        let recorded = match result {
            Ok(value) => recorder.finish(id, Some(rows(value))),
            Err(e) => recorder.fail(id, &e.to_string()),
        };
        if let Err(e) = recorded {
            warn!(error = %e, "Failed to record stage span");
        }
    }

    fn span_note(&self, span: Option<&str>, key: &str, value: serde_json::Value) {
        let (Some(recorder), Some(id)) = (&self.recorder, span) else {
            return;
        };
        if let Err(e) = recorder.annotate(id, key, value) {
            warn!(error = %e, "Failed to annotate stage span");
        }
    }

    /// Build the context and future frames for one target.
    pub fn frames(&self, dataset: &Dataset, target: Target) -> Result<(ContextFrame, FutureFrame)> {
        self.frames_in(dataset, target, None)
    }

    fn frames_in(
        &self,
        dataset: &Dataset,
        target: Target,
        parent: Option<&str>,
    ) -> Result<(ContextFrame, FutureFrame)> {
        let span = self.span_start(Stage::FrameBuild, target.column(), parent);
        let result = build_context(dataset, target, &self.settings.series_id)
            .and_then(|ctx| Ok((ctx, build_future(&self.settings.range, &self.settings.series_id)?)))
            .map_err(|e| Error::from(e).in_pass(target, Stage::FrameBuild));
        self.span_end(span.as_deref(), &result, |(ctx, _)| ctx.len());
        result
    }

    /// Call the forecaster and verify that it answered every requested
    /// future row, in order.
    pub async fn forecast(
        &self,
        context: ContextFrame,
        future: FutureFrame,
    ) -> Result<QuantileForecast> {
        self.forecast_in(context, future, None).await
    }

    async fn forecast_in(
        &self,
        context: ContextFrame,
        future: FutureFrame,
        parent: Option<&str>,
    ) -> Result<QuantileForecast> {
        let target = context.target;
        let request = ForecastRequest::new(
            context,
            future,
            self.settings.quantile_levels.clone(),
            self.settings.bindings(target),
        );
        let expected = request.future.clone();

        info!(
            series = %target,
            forecaster = self.forecaster.name(),
            context_rows = request.context.len(),
            prediction_length = request.prediction_length,
            "Requesting forecast"
        );

        let span = self.span_start(Stage::Forecast, target.column(), parent);
        let result = match self.forecaster.forecast(request).await {
            Ok(forecast) => forecast
                .verify_contract(&expected)
                .map(|()| forecast)
                .map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        }
        .map_err(|e| e.in_pass(target, Stage::Forecast));
        self.span_end(span.as_deref(), &result, QuantileForecast::len);
        result
    }

    /// One full pass: frames, forecast, choice join, selection, count cast,
    /// and (optionally) the figure. Recorded as a `pass` span with one child
    /// span per stage.
    pub async fn run_pass(
        &self,
        dataset: &Dataset,
        target: Target,
        choice: &QuantileChoice,
    ) -> Result<PassOutcome> {
        let span = self.span_start(Stage::Pass, target.column(), None);
        let result = self.pass_stages(dataset, target, choice, span.as_deref()).await;
        self.span_end(span.as_deref(), &result, |p| p.imputed.len());
        result
    }

    async fn pass_stages(
        &self,
        dataset: &Dataset,
        target: Target,
        choice: &QuantileChoice,
        parent: Option<&str>,
    ) -> Result<PassOutcome> {
        let (context, future) = self.frames_in(dataset, target, parent)?;
        let forecast = self.forecast_in(context, future, parent).await?;

        let span = self.span_start(Stage::Select, target.column(), parent);
        let joined = join_choices(&forecast, choice);
        let selected = select_quantiles(&joined, choice)
            .map_err(|e| Error::from(e).in_pass(target, Stage::Select));
        self.span_end(span.as_deref(), &selected, SelectedSeries::len);
        let selected = selected?;
        debug!(
            series = %target,
            forecast_rows = forecast.len(),
            joined_rows = joined.len(),
            defined = selected.defined(),
            "Selected quantiles"
        );

        let span = self.span_start(Stage::Merge, target.column(), parent);
        let imputed =
            cast_counts(&selected).map_err(|e| Error::from(e).in_pass(target, Stage::Merge));
        self.span_end(span.as_deref(), &imputed, ImputedColumn::len);
        let imputed = imputed?;

        if let Some(presenter) = &self.presenter {
            let span = self.span_start(Stage::Present, target.column(), parent);
            let fig = plot::figure(target, dataset, &imputed, self.settings.show_gaps);
            let result = presenter
                .present(target, &fig)
                .map_err(|e| e.in_pass(target, Stage::Present));
            self.span_end(span.as_deref(), &result, |_| fig.traces.len());
            result?;
        }

        Ok(PassOutcome {
            target,
            forecast,
            selected,
            imputed,
        })
    }

    /// Run both passes in order and fold the imputed years onto `dataset`.
    ///
    /// The first failing pass aborts the run.
    pub async fn reconcile(&self, dataset: &Dataset, choices: &ChoiceTables) -> Result<RunOutcome> {
        let mut passes = Vec::with_capacity(Target::ALL.len());
        for target in Target::ALL {
            let pass = self.run_pass(dataset, target, choices.get(target)).await?;
            info!(series = %target, imputed = pass.imputed.len(), "Pass complete");
            passes.push(pass);
        }

        let span = self.span_start(Stage::Merge, "combine", None);
        // Target::ALL runs Hare first.
        let (hare, lynx) = (&passes[0].imputed, &passes[1].imputed);
        let combined = combine_targets(hare, lynx);
        let dropped = unmatched_years(hare, lynx);
        if !dropped.is_empty() {
            debug!(?dropped, "Years imputed for only one target were dropped");
            self.span_note(span.as_deref(), "dropped_years", json!(dropped));
        }
        let table = concat_relaxed(dataset, combined);
        self.span_end(span.as_deref(), &Ok::<_, Error>(&table), |t| t.table.len());

        info!(
            original_rows = table.original_rows,
            imputed_rows = table.imputed_rows(),
            "Reconciled dataset"
        );

        Ok(RunOutcome { table, passes })
    }
}

//! Figure construction and a Plotly-compatible JSON presenter.

use std::path::{Path, PathBuf};

use gapfill_core::error::Error;
use gapfill_core::present::{Figure, LineDash, Presenter, Trace};
use gapfill_core::series::{Dataset, Target};
use serde_json::{Value, json};
use tracing::info;

use crate::merge::ImputedColumn;

pub const REAL_TRACE: &str = "Real data";
pub const IMPUTED_TRACE: &str = "Imputed data";

/// Describe the figure for one target: the original series solid, the
/// imputed projection dashed.
///
/// With `show_gaps` off, null imputed years are left out so the dashed line
/// runs straight across them.
pub fn figure(target: Target, original: &Dataset, imputed: &ImputedColumn, show_gaps: bool) -> Figure {
    let (x, y) = original
        .observations(target)
        .map(|o| (o.year, o.value.map(|n| n.as_f64())))
        .unzip();
    let real = Trace {
        name: REAL_TRACE.into(),
        x,
        y,
        dash: LineDash::Solid,
    };

    let (x, y) = imputed
        .values
        .iter()
        .filter(|(_, v)| show_gaps || v.is_some())
        .map(|&(year, v)| (year, v.map(|c| c as f64)))
        .unzip();
    let dashed = Trace {
        name: IMPUTED_TRACE.into(),
        x,
        y,
        dash: LineDash::Dash,
    };

    Figure {
        title: target.column().into(),
        x_title: "Year".into(),
        y_title: "Population".into(),
        traces: vec![real, dashed],
    }
}

/// Writes each figure to `<dir>/<Target>.json` as a Plotly figure document.
pub struct PlotlyJsonPresenter {
    dir: PathBuf,
}

impl PlotlyJsonPresenter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn figure_path(dir: &Path, target: Target) -> PathBuf {
        dir.join(format!("{}.json", target.column()))
    }

    fn to_plotly(figure: &Figure) -> Value {
        let data: Vec<Value> = figure
            .traces
            .iter()
            .map(|t| {
                let dash = match t.dash {
                    LineDash::Solid => "solid",
                    LineDash::Dash => "dash",
                };
                json!({
                    "type": "scatter",
                    "mode": "lines",
                    "name": t.name,
                    "x": t.x,
                    "y": t.y,
                    "line": { "dash": dash },
                })
            })
            .collect();

        json!({
            "data": data,
            "layout": {
                "title": { "text": figure.title, "x": 0.5 },
                "xaxis": { "title": { "text": figure.x_title } },
                "yaxis": { "title": { "text": figure.y_title } },
            },
        })
    }
}

impl Presenter for PlotlyJsonPresenter {
    fn name(&self) -> &str {
        "plotly-json"
    }

    fn present(&self, target: Target, figure: &Figure) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::Io {
            path: self.dir.clone(),
            reason: e.to_string(),
        })?;
        let path = Self::figure_path(&self.dir, target);
        let body = serde_json::to_vec_pretty(&Self::to_plotly(figure))?;
        std::fs::write(&path, body).map_err(|e| Error::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        info!(series = %target, path = %path.display(), "Wrote figure");
        Ok(())
    }
}

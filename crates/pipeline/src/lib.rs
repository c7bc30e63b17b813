//! The gapfill reconciliation pipeline.
//!
//! One parameterized pass per [`Target`](gapfill_core::series::Target):
//! frames → forecaster → quantile selection → count cast, followed by a
//! single merge of both passes back onto the original dataset.

pub mod frames;
pub mod job;
pub mod merge;
pub mod plot;
pub mod runner;
pub mod select;
pub mod table;

pub use job::{RunOptions, load_inputs, run_to_file};
pub use merge::{ImputedColumn, ReconciledTable};
pub use plot::PlotlyJsonPresenter;
pub use runner::{ChoiceTables, PassOutcome, Pipeline, PipelineSettings, RunOutcome};
pub use select::{SelectedPoint, SelectedSeries};

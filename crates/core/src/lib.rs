//! # gapfill Core
//!
//! Domain types, traits, and error definitions for the gapfill imputation
//! pipeline. No I/O happens here.
//!
//! The two external collaborators, the probabilistic forecaster and the plot
//! renderer, are traits ([`Forecaster`], [`Presenter`]); their implementations
//! live in `gapfill-forecasters` and `gapfill-pipeline`.

pub mod choice;
pub mod error;
pub mod forecast;
pub mod frame;
pub mod present;
pub mod series;
pub mod stage;

// Re-export key types at crate root for ergonomics
pub use choice::QuantileChoice;
pub use error::{Error, Result};
pub use forecast::{
    ForecastRequest, ForecastRow, Forecaster, QuantileCell, QuantileForecast, QuantileLevel,
};
pub use frame::{ColumnBindings, ContextFrame, FutureFrame, YearRange};
pub use present::{Figure, LineDash, Presenter, Trace};
pub use series::{ColumnType, Dataset, Number, Observation, Row, Target, Year};
pub use stage::Stage;

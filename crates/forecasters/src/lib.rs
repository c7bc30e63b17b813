//! Forecaster backends for gapfill.
//!
//! All backends implement the `gapfill_core::Forecaster` trait.
//! `build_from_config` selects the backend named in the configuration.

pub mod http;
pub mod replay;
pub mod router;
pub mod wire;

pub use http::HttpForecaster;
pub use replay::ReplayForecaster;
pub use router::build_from_config;

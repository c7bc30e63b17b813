//! Presentation boundary: figures handed to an external plotting collaborator.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::series::{Target, Year};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineDash {
    Solid,
    Dash,
}

/// One line of a figure. `None` values render as gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub x: Vec<Year>,
    pub y: Vec<Option<f64>>,
    pub dash: LineDash,
}

/// A renderer-agnostic figure description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub traces: Vec<Trace>,
}

/// Renders figures somewhere (window, file, service). Read-only over its input.
pub trait Presenter: Send + Sync {
    fn name(&self) -> &str;

    fn present(&self, target: Target, figure: &Figure) -> Result<(), Error>;
}

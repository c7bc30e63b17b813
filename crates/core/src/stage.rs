//! Pipeline stages, used to tag errors and telemetry spans.

use serde::{Deserialize, Serialize};

/// One step of a gapfill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the original dataset and choice tables.
    Load,
    /// One whole target pass; parent of that pass's stage spans.
    Pass,
    /// Building context and future frames.
    FrameBuild,
    /// The external forecaster call and its contract check.
    Forecast,
    /// Collapsing quantile rows to point estimates.
    Select,
    /// Joining, casting, and concatenating.
    Merge,
    /// Handing figures to the presentation adapter.
    Present,
    /// Writing the output artifact.
    Write,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Load,
        Stage::Pass,
        Stage::FrameBuild,
        Stage::Forecast,
        Stage::Select,
        Stage::Merge,
        Stage::Present,
        Stage::Write,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Pass => "pass",
            Self::FrameBuild => "frame_build",
            Self::Forecast => "forecast",
            Self::Select => "select",
            Self::Merge => "merge",
            Self::Present => "present",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

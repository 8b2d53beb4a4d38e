//! Diameter estimation from a measurement context.
//!
//! Two readings are available:
//! - [`MeasureMode::Inscribed`]: largest bacteria-free disk (step fit on a
//!   switch profile). This is the default and the batch mode.
//! - [`MeasureMode::Circumscribed`]: smallest disk containing the zone
//!   (breakpoint on a mean profile). Reads D-shaped zones on their long side.

mod circumscribed;
mod inscribed;
mod sensitivity;

use std::fmt;
use std::str::FromStr;

use crate::config::MeasureConfig;
use crate::error::{MeasureError, Result};
use crate::preprocess::MeasurementContext;

pub use sensitivity::reading_sensitivity;

/// Which diameter to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureMode {
    #[default]
    Inscribed,
    Circumscribed,
}

impl fmt::Display for MeasureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inscribed => f.write_str("inscribed"),
            Self::Circumscribed => f.write_str("circumscribed"),
        }
    }
}

impl FromStr for MeasureMode {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inscribed" => Ok(Self::Inscribed),
            "circumscribed" => Ok(Self::Circumscribed),
            _ => Err(MeasureError::InvalidConfig(format!(
                "unknown measure mode '{s}'"
            ))),
        }
    }
}

/// What the estimator concluded about one pellet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneOutcome {
    /// A zone boundary was found.
    Measured,
    /// Bacteria grow up to the pellet.
    NoInhibition,
    /// Nothing grows anywhere in the pellet's region.
    FullInhibition,
    /// The zone reaches or exceeds the configured maximum diameter.
    AtMaximum,
}

/// Quality score of a reading. The two modes score differently and the
/// values are not comparable across them.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Confidence {
    /// Inscribed: step-fit confidence in [0, 1], higher is better.
    StepFit(f32),
    /// Circumscribed: RMS residual (0-255 units) of a step fitted at the
    /// breakpoint, lower is better.
    RmsResidual(f32),
}

/// One measured inhibition zone.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InhibDisk {
    pub outcome: ZoneOutcome,
    /// Diameter in mm, capped at the configured maximum. `None` only when
    /// an inscribed reading finds no inhibition.
    pub diameter_mm: Option<f32>,
    pub confidence: Confidence,
}

/// Pellet radius (px) at `px_per_mm`, rounded up.
pub(crate) fn pellet_radius_px(pellet_diameter_mm: f32, px_per_mm: f32) -> usize {
    (pellet_diameter_mm * px_per_mm / 2.0).ceil().max(0.0) as usize
}

/// Measure one pellet.
pub fn estimate_diameter(
    ctx: &MeasurementContext,
    index: usize,
    mode: MeasureMode,
    config: &MeasureConfig,
) -> Result<InhibDisk> {
    match mode {
        MeasureMode::Inscribed => inscribed::measure_inscribed(ctx, index, config),
        MeasureMode::Circumscribed => circumscribed::measure_circumscribed(ctx, index, config),
    }
}

/// Inscribed reading of every pellet, in circle order. Stops at the first
/// failing pellet.
pub fn estimate_all_diameters(
    ctx: &MeasurementContext,
    config: &MeasureConfig,
) -> Result<Vec<InhibDisk>> {
    (0..ctx.pellet_count())
        .map(|i| inscribed::measure_inscribed(ctx, i, config))
        .collect()
}

/// Reading of every pellet, in circle order, with one result per pellet so
/// a failing pellet does not hide its siblings.
pub fn estimate_each_diameter(
    ctx: &MeasurementContext,
    mode: MeasureMode,
    config: &MeasureConfig,
) -> Vec<Result<InhibDisk>> {
    (0..ctx.pellet_count())
        .map(|i| estimate_diameter(ctx, i, mode, config))
        .collect()
}

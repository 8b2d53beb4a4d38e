//! Circumscribed diameter: the smallest disk around the pellet containing the
//! whole zone, read on the mean intensity profile.

use crate::config::MeasureConfig;
use crate::error::{MeasureError, Result};
use crate::preprocess::MeasurementContext;
use crate::radial_profile::ProfileKind;

use super::{pellet_radius_px, Confidence, InhibDisk, ZoneOutcome};

/// The breakpoint level sits this much above the profile mid-range.
const BREAKPOINT_LEVEL_GAIN: f32 = 1.1;
/// Tolerance (0-255 units) between a sample and the breakpoint level.
const BREAKPOINT_TOLERANCE: f32 = 1.0;

pub(crate) fn measure_circumscribed(
    ctx: &MeasurementContext,
    index: usize,
    config: &MeasureConfig,
) -> Result<InhibDisk> {
    ctx.check_index(index)?;
    let profile = ctx.radial_profile(index, ProfileKind::Mean, 0.0)?;
    let local_threshold = ctx.local_thresholds()[index];
    tracing::debug!(pellet = index, local_threshold, "circumscribed profile");
    circumscribed_from_profile(
        &profile,
        ctx.px_per_mm(),
        config.pellets.diameter_mm,
        config.inhibition.max_diameter_mm,
        local_threshold,
    )
    .map_err(|e| match e {
        MeasureError::ProfileTooShort {
            len,
            pellet_radius_px,
            ..
        } => MeasureError::ProfileTooShort {
            index,
            len,
            pellet_radius_px,
        },
        other => other,
    })
}

/// Read the circumscribed zone on a mean profile (0-255 scale).
///
/// `local_threshold` is the pellet's bacteria/inhibition level: a profile
/// already above it just past the pellet means no zone at all.
pub(crate) fn circumscribed_from_profile(
    profile: &[f32],
    px_per_mm: f32,
    pellet_diameter_mm: f32,
    max_diameter_mm: f32,
    local_threshold: f32,
) -> Result<InhibDisk> {
    let pellet_r = pellet_radius_px(pellet_diameter_mm, px_per_mm);
    if profile.len() <= pellet_r {
        return Err(MeasureError::ProfileTooShort {
            index: 0,
            len: profile.len(),
            pellet_radius_px: pellet_r,
        });
    }
    let y = &profile[pellet_r..];

    let pellet_end = pellet_tail_end(y);
    let tail = &y[pellet_end..];
    let (min_y, max_y) = tail
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let level = (max_y + min_y) / 2.0 * BREAKPOINT_LEVEL_GAIN;

    // Mean intensity 0.5 mm to 1 mm past the pellet edge.
    let window_start = pellet_end + (px_per_mm * 0.5).ceil() as usize;
    let window_end = pellet_end + px_per_mm.ceil() as usize;
    if window_end < y.len() && window_end != window_start {
        let window = &y[window_start..window_end];
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        if mean > local_threshold {
            tracing::debug!(mean, local_threshold, "bacteria next to the pellet");
            return Ok(InhibDisk {
                outcome: ZoneOutcome::NoInhibition,
                diameter_mm: Some(pellet_diameter_mm),
                confidence: Confidence::RmsResidual(step_rms(y, pellet_end, pellet_end)),
            });
        }
    }

    let breakpoint = (pellet_end + 1..y.len())
        .find(|&i| level - y[i] <= BREAKPOINT_TOLERANCE && y[i] > y[i - 1]);

    let (outcome, diameter, split) = match breakpoint {
        Some(i) => {
            let raw = 2.0 * (i + pellet_r) as f32 / px_per_mm;
            if raw >= max_diameter_mm {
                (ZoneOutcome::AtMaximum, max_diameter_mm, i)
            } else {
                (ZoneOutcome::Measured, raw, i)
            }
        }
        None => (ZoneOutcome::AtMaximum, max_diameter_mm, y.len()),
    };
    let rms = step_rms(y, pellet_end, split);
    tracing::debug!(pellet_end, level, ?breakpoint, diameter, rms, "circumscribed fit");

    Ok(InhibDisk {
        outcome,
        diameter_mm: Some(diameter),
        confidence: Confidence::RmsResidual(rms),
    })
}

/// Index where the pellet's own bright, decreasing tail ends.
///
/// Walks forward while each sample is (after rounding) below the previous
/// one. A profile decreasing all the way yields 0.
fn pellet_tail_end(y: &[f32]) -> usize {
    let mut previous = match y.first() {
        Some(&v) => v,
        None => return 0,
    };
    for (i, &v) in y.iter().enumerate().skip(1) {
        if (v - previous).round() < 0.0 {
            previous = v;
        } else {
            return i;
        }
    }
    0
}

/// RMS residual of `y[start..]` against a two-level step switching at `split`
/// (each side at its own mean).
fn step_rms(y: &[f32], start: usize, split: usize) -> f32 {
    let start = start.min(y.len());
    let split = split.clamp(start, y.len());
    let n = y.len() - start;
    if n == 0 {
        return 0.0;
    }
    let side_sq_err = |side: &[f32]| -> f64 {
        if side.is_empty() {
            return 0.0;
        }
        let mean = side.iter().map(|&v| v as f64).sum::<f64>() / side.len() as f64;
        side.iter().map(|&v| (v as f64 - mean).powi(2)).sum()
    };
    let sq = side_sq_err(&y[start..split]) + side_sq_err(&y[split..]);
    (sq / n as f64).sqrt() as f32
}

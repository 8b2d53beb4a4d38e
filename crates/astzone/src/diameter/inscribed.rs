//! Inscribed diameter: the largest disk around the pellet free of bacteria.
//!
//! A binary (switch) profile is fitted with a two-level step: low inside the
//! zone, high outside. The step position minimizing the squared error is the
//! zone radius.

use crate::cluster::ClusterCenters;
use crate::config::MeasureConfig;
use crate::error::{MeasureError, Result};
use crate::preprocess::MeasurementContext;
use crate::radial_profile::ProfileKind;

use super::sensitivity::{
    reading_sensitivity, relative_contrast_difference, BIG_CONTRAST_DIFFERENCE,
};
use super::{pellet_radius_px, Confidence, InhibDisk, ZoneOutcome};

/// Width (mm) of a profile glitch considered acceptable when scoring the fit.
const ALLOWED_ERROR_MM: f32 = 1.5;

pub(crate) fn measure_inscribed(
    ctx: &MeasurementContext,
    index: usize,
    config: &MeasureConfig,
) -> Result<InhibDisk> {
    ctx.check_index(index)?;
    let local = ctx.local_centers()[index];
    let global = *ctx.global_centers();
    let params = &config.inhibition;

    let sensitivity = reading_sensitivity(&local, &global, params);
    let centers = decision_centers(&local, &global, params.min_contrast);
    let threshold = centers.threshold(sensitivity) / 255.0;
    tracing::debug!(
        pellet = index,
        sensitivity,
        threshold,
        uses_dish_centers = (centers == global),
        "inscribed threshold"
    );

    let profile = ctx.radial_profile(index, ProfileKind::Switch, threshold)?;
    inscribed_from_profile(
        &profile,
        ctx.px_per_mm(),
        config.pellets.diameter_mm,
        params.max_diameter_mm,
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

/// Pick the cluster centers used to threshold one pellet's profile.
///
/// A large zone can leave almost no bacteria inside the ROI, which flattens
/// the local clustering; the dish-wide centers are used instead.
fn decision_centers(
    local: &ClusterCenters,
    global: &ClusterCenters,
    min_contrast: f32,
) -> ClusterCenters {
    let is_large_inhibition = local.bacteria < global.inhibition;
    let big_difference = relative_contrast_difference(local, global) >= BIG_CONTRAST_DIFFERENCE;
    if is_large_inhibition || (big_difference && global.contrast() > min_contrast) {
        *global
    } else {
        *local
    }
}

/// Fit the inscribed zone on a switch profile (0-255 scale).
pub(crate) fn inscribed_from_profile(
    profile: &[f32],
    px_per_mm: f32,
    pellet_diameter_mm: f32,
    max_diameter_mm: f32,
) -> Result<InhibDisk> {
    let (lv, hv) = profile
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if profile.is_empty() || lv >= hv {
        // The profile never drops: bacteria reach the pellet.
        return Ok(InhibDisk {
            outcome: ZoneOutcome::NoInhibition,
            diameter_mm: None,
            confidence: Confidence::StepFit(1.0),
        });
    }

    let pellet_r = pellet_radius_px(pellet_diameter_mm, px_per_mm);
    if profile.len() <= pellet_r {
        return Err(MeasureError::ProfileTooShort {
            index: 0,
            len: profile.len(),
            pellet_radius_px: pellet_r,
        });
    }

    let data = &profile[pellet_r..];
    let (radius_px, mse, outcome) = if data.iter().all(|&v| v == 0.0) {
        (profile.len(), 0.0, ZoneOutcome::FullInhibition)
    } else {
        let n = data.len() as f64;
        let mut best_mse = square_error(data, hv) / n;
        let mut best_i = 0usize;
        for i in 1..data.len() {
            let err = square_error(&data[..i], lv) + square_error(&data[i..], hv);
            let mse = err / n;
            if mse < best_mse {
                best_mse = mse;
                best_i = i;
            }
        }
        (best_i + pellet_r, best_mse, ZoneOutcome::Measured)
    };

    let confidence = if mse == 0.0 {
        1.0
    } else {
        let max_error = (px_per_mm * ALLOWED_ERROR_MM * hv) as f64;
        (max_error / mse).min(1.0) as f32
    };

    let raw_diameter = 2.0 * radius_px as f32 / px_per_mm;
    let diameter = raw_diameter.min(max_diameter_mm);
    let outcome = if outcome == ZoneOutcome::Measured && raw_diameter >= max_diameter_mm {
        ZoneOutcome::AtMaximum
    } else {
        outcome
    };
    tracing::debug!(radius_px, mse, diameter, ?outcome, "inscribed fit");

    Ok(InhibDisk {
        outcome,
        diameter_mm: Some(diameter),
        confidence: Confidence::StepFit(confidence),
    })
}

fn square_error(values: &[f32], level: f32) -> f64 {
    values
        .iter()
        .map(|&v| {
            let d = (v - level) as f64;
            d * d
        })
        .sum()
}

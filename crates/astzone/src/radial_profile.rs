//! Radial intensity profiles around a pellet.
//!
//! A profile maps every integer radius `0..=n/2` (pixels, measured from the
//! center of an `n`-row ROI) to one value on the 0-255 scale. Pixels with a
//! negative value are masked and never contribute.

use std::fmt;
use std::str::FromStr;

use image::{GenericImageView, Luma};

use crate::error::{MeasureError, Result};

/// How the pixels sharing one radius are reduced to a profile value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Mean intensity.
    Mean,
    /// Maximum intensity.
    Max,
    /// Mean of the brightest `2 * px_per_mm` pixels.
    MaxAverage,
    /// Fraction of pixels above a threshold, saturated: 1 when more than
    /// `2 * px_per_mm` pixels exceed it, 0 below `px_per_mm`.
    Switch,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Max => "max",
            Self::MaxAverage => "max_average",
            Self::Switch => "switch",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            "max_average" | "maxaverage" => Ok(Self::MaxAverage),
            "switch" => Ok(Self::Switch),
            _ => Err(MeasureError::UnknownProfileKind(s.to_string())),
        }
    }
}

/// Compute the radial profile of `image` around its center.
///
/// The center is `(n/2, n/2)` with `n` the number of rows; pixels farther
/// than `n/2` (after rounding) are ignored. `threshold` (0-1 scale) is only
/// used by [`ProfileKind::Switch`]. The result has `n/2 + 1` entries scaled
/// to 0-255.
pub fn radial_profile<I>(
    image: &I,
    kind: ProfileKind,
    px_per_mm: f32,
    threshold: f32,
) -> Result<Vec<f32>>
where
    I: GenericImageView<Pixel = Luma<f32>>,
{
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(MeasureError::EmptyImage { what: "profile" });
    }

    let n = h as usize;
    let half = n / 2;
    let mut profile = vec![0.0f32; half + 1];
    let mut counts = vec![0u32; half + 1];
    let mut by_radius: Vec<Vec<f32>> = if kind == ProfileKind::MaxAverage {
        vec![Vec::new(); half + 1]
    } else {
        Vec::new()
    };

    for y in 0..n {
        let dy = y as f64 - half as f64;
        for x in 0..(w as usize).min(n) {
            let dx = x as f64 - half as f64;
            let r = (dx * dx + dy * dy).sqrt().round() as usize;
            if r > half {
                continue;
            }
            let v = image.get_pixel(x as u32, y as u32)[0];
            if v < 0.0 {
                continue;
            }
            match kind {
                ProfileKind::Mean => profile[r] += v,
                ProfileKind::Max => profile[r] = profile[r].max(v),
                ProfileKind::MaxAverage => by_radius[r].push(v),
                ProfileKind::Switch => {
                    if v > threshold {
                        profile[r] += 1.0;
                    }
                }
            }
            counts[r] += 1;
        }
    }

    let ppm = px_per_mm;
    match kind {
        ProfileKind::Mean => {
            for (p, &c) in profile.iter_mut().zip(&counts) {
                *p = if c > 0 { *p / c as f32 } else { 0.0 };
            }
        }
        ProfileKind::Max => {}
        ProfileKind::MaxAverage => {
            let top_n = (2.0 * ppm.round()).max(1.0) as usize;
            for (p, values) in profile.iter_mut().zip(by_radius.iter_mut()) {
                if values.is_empty() {
                    continue;
                }
                values.sort_by(|a, b| b.total_cmp(a));
                let take = top_n.min(values.len()).max(1);
                *p = values[..take].iter().sum::<f32>() / take as f32;
            }
        }
        ProfileKind::Switch => {
            let inner_px = ppm.round() as usize;
            for (r, p) in profile.iter_mut().enumerate() {
                *p = if r < inner_px || *p > 2.0 * ppm {
                    1.0
                } else if *p > ppm {
                    *p / (2.0 * ppm)
                } else {
                    0.0
                };
            }
        }
    }

    for p in &mut profile {
        *p *= 255.0;
    }
    Ok(profile)
}

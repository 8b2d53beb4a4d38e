use std::path::Path;

use crate::error::{MeasureError, Result};

/// Culture medium of the dish, which decides the grayscale conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMedium {
    /// Standard Mueller-Hinton agar.
    #[default]
    MuellerHinton,
    /// Blood-enriched agar. The red channel carries no zone contrast and is
    /// replaced by the green channel before conversion.
    Blood,
}

/// Dish-level settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DishParams {
    /// Margin (mm) kept between the outermost pellets and the working region edge.
    pub border_pellet_distance_mm: f32,
    /// Culture medium.
    pub growth_medium: GrowthMedium,
}

impl Default for DishParams {
    fn default() -> Self {
        Self {
            border_pellet_distance_mm: 2.0,
            growth_medium: GrowthMedium::MuellerHinton,
        }
    }
}

/// Antibiotic pellet settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PelletParams {
    /// Physical pellet diameter (mm). Also the image scale reference.
    pub diameter_mm: f32,
}

impl Default for PelletParams {
    fn default() -> Self {
        Self { diameter_mm: 6.0 }
    }
}

/// Inhibition measurement settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InhibitionParams {
    /// Largest diameter (mm) that can be reported.
    pub max_diameter_mm: f32,
    /// Target resolution (px/mm) of the measurement image. Images are never upscaled.
    pub standardized_px_per_mm: f32,
    /// Bacteria/inhibition contrast (0-255) below which a zone reads as low contrast.
    pub min_contrast: f32,
    /// Bacteria/inhibition contrast (0-255) expected on a good picture.
    pub max_contrast: f32,
    /// Diameter reading sensitivity in [0, 1]. 0 selects it automatically per pellet.
    pub sensitivity: f32,
    /// Independent k-means restarts; the most compact result wins.
    pub kmeans_attempts: u32,
    /// Seed for k-means++ initialization.
    pub kmeans_seed: u64,
    /// Grayscale level (0-255) from which a pixel is treated as pellet.
    pub min_pellet_intensity: u8,
    /// Longest side (px) of an image handed to clustering; larger ones are downscaled.
    pub clustering_max_side_px: u32,
}

impl Default for InhibitionParams {
    fn default() -> Self {
        Self {
            max_diameter_mm: 40.0,
            standardized_px_per_mm: 10.0,
            min_contrast: 25.0,
            max_contrast: 90.0,
            sensitivity: 0.0,
            kmeans_attempts: 10,
            kmeans_seed: 42,
            min_pellet_intensity: 160,
            clustering_max_side_px: 150,
        }
    }
}

/// Full measurement configuration.
///
/// Passed by value into [`crate::ZoneMeter`]; there is no process-wide
/// settings object.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    pub dish: DishParams,
    pub pellets: PelletParams,
    pub inhibition: InhibitionParams,
}

impl MeasureConfig {
    /// Load a (possibly partial) configuration from JSON. Missing fields keep
    /// their defaults.
    pub fn from_json_file(path: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        let inhib = &self.inhibition;
        let positive = [
            ("pellets.diameter_mm", self.pellets.diameter_mm),
            ("inhibition.max_diameter_mm", inhib.max_diameter_mm),
            ("inhibition.standardized_px_per_mm", inhib.standardized_px_per_mm),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(MeasureError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let border = self.dish.border_pellet_distance_mm;
        if border.is_nan() || border < 0.0 {
            return Err(MeasureError::InvalidConfig(format!(
                "dish.border_pellet_distance_mm must be >= 0, got {border}"
            )));
        }
        if !(0.0..=1.0).contains(&inhib.sensitivity) {
            return Err(MeasureError::InvalidConfig(format!(
                "inhibition.sensitivity must be in [0, 1], got {}",
                inhib.sensitivity
            )));
        }
        if !(inhib.min_contrast >= 0.0 && inhib.min_contrast < inhib.max_contrast) {
            return Err(MeasureError::InvalidConfig(format!(
                "inhibition contrast bounds must satisfy 0 <= min < max, got {} / {}",
                inhib.min_contrast, inhib.max_contrast
            )));
        }
        if self.pellets.diameter_mm >= inhib.max_diameter_mm {
            return Err(MeasureError::InvalidConfig(format!(
                "max inhibition diameter {} mm does not exceed the pellet diameter {} mm",
                inhib.max_diameter_mm, self.pellets.diameter_mm
            )));
        }
        if inhib.kmeans_attempts == 0 {
            return Err(MeasureError::InvalidConfig(
                "inhibition.kmeans_attempts must be >= 1".to_string(),
            ));
        }
        if inhib.clustering_max_side_px < 2 {
            return Err(MeasureError::InvalidConfig(format!(
                "inhibition.clustering_max_side_px must be >= 2, got {}",
                inhib.clustering_max_side_px
            )));
        }
        Ok(())
    }

    /// Largest measurable radius (mm), i.e. half the max diameter.
    pub(crate) fn max_radius_mm(&self) -> f32 {
        self.inhibition.max_diameter_mm / 2.0
    }
}

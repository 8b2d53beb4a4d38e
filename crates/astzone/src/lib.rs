//! astzone: inhibition-zone measurement for disk-diffusion antibiograms.
//!
//! Given a cropped dish photograph and the pixel circles of its antibiotic
//! pellets, measures the diameter of the bacteria-free zone around each
//! pellet. The pipeline stages are:
//!
//! 1. **Preprocess** – grayscale conversion, dish regions, median blur,
//!    rescale to a standard resolution, masking and padding.
//! 2. **Cluster** – dish-wide and per-pellet inhibition/bacteria levels.
//! 3. **Geometry** – one non-overlapping ROI per pellet.
//! 4. **Radial profile** – intensity as a function of distance to the pellet.
//! 5. **Diameter** – inscribed (step fit) or circumscribed (breakpoint)
//!    reading with adaptive sensitivity and a confidence score.
//!
//! # Public API
//! - [`ZoneMeter`] as the primary entry point
//! - [`MeasureConfig`] for tuning
//! - [`MeasurementContext`] and the free stage functions for callers that
//!   drive the pipeline step by step

mod api;
mod cache;
mod cluster;
mod config;
mod diameter;
mod error;
mod geometry;
mod preprocess;
mod radial_profile;

#[cfg(test)]
pub(crate) mod test_utils;

/// Single-channel `f32` measurement image. Valid pixels lie in [0, 1];
/// excluded pixels hold -1.
pub type MeasureImage = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

pub use api::ZoneMeter;
pub use cache::ImageCache;
pub use cluster::{ClusterCenters, IntensityClusterer, KMeansClusterer};
pub use config::{DishParams, GrowthMedium, InhibitionParams, MeasureConfig, PelletParams};
pub use diameter::{
    estimate_all_diameters, estimate_diameter, estimate_each_diameter, reading_sensitivity,
    Confidence, InhibDisk, MeasureMode, ZoneOutcome,
};
pub use error::{ErrorKind, MeasureError, Result};
pub use geometry::{compute_rois, mm_per_px, px_per_mm, Circle, RoiRect};
pub use preprocess::{compute_measurement_context, MeasurementContext};
pub use radial_profile::{radial_profile, ProfileKind};

/// A segmented dish, as delivered by dish localization.
#[derive(Debug, Clone)]
pub struct Dish {
    /// Cropped dish photograph.
    pub image: image::RgbImage,
    /// Crop rectangle in the original photograph.
    pub bounding_box: RoiRect,
    /// Round Petri dish (as opposed to a rectangular one).
    pub is_round: bool,
}

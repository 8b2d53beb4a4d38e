//! High-level measurement API.
//!
//! [`ZoneMeter`] is the primary entry point. It owns a validated
//! [`MeasureConfig`] and the clustering capability, and forwards to the
//! pipeline stages.

use std::path::Path;

use image::RgbImage;

use crate::cache::ImageCache;
use crate::cluster::{IntensityClusterer, KMeansClusterer};
use crate::config::MeasureConfig;
use crate::diameter::{self, InhibDisk, MeasureMode};
use crate::error::Result;
use crate::geometry::Circle;
use crate::preprocess::{self, MeasurementContext};
use crate::Dish;

/// Primary measurement interface.
///
/// Create once, measure many dishes.
///
/// # Examples
///
/// ```no_run
/// use astzone::{Circle, MeasureConfig, MeasureMode, ZoneMeter};
///
/// let meter = ZoneMeter::new(MeasureConfig::default()).unwrap();
/// let image = image::open("dish.png").unwrap().to_rgb8();
/// let circles = vec![Circle::new(120.0, 140.0, 30.0), Circle::new(420.0, 140.0, 30.0)];
/// let ctx = meter.compute_measurement_context(&image, false, &circles).unwrap();
/// for disk in meter.estimate_all_diameters(&ctx).unwrap() {
///     println!("{:?} {:?}", disk.outcome, disk.diameter_mm);
/// }
/// let d = meter.estimate_diameter(&ctx, 1, MeasureMode::Circumscribed).unwrap();
/// println!("{:?}", d.diameter_mm);
/// ```
pub struct ZoneMeter {
    config: MeasureConfig,
    clusterer: Box<dyn IntensityClusterer + Send + Sync>,
    /// The clusterer is the built-in k-means seeded from `config`.
    seeded_from_config: bool,
}

impl ZoneMeter {
    /// Create a meter with the built-in k-means clustering, seeded from the
    /// config.
    pub fn new(config: MeasureConfig) -> Result<Self> {
        let clusterer = KMeansClusterer::new(
            config.inhibition.kmeans_attempts,
            config.inhibition.kmeans_seed,
        );
        let mut meter = Self::with_clusterer(config, Box::new(clusterer))?;
        meter.seeded_from_config = true;
        Ok(meter)
    }

    /// Create a meter with a caller-provided clustering implementation.
    pub fn with_clusterer(
        config: MeasureConfig,
        clusterer: Box<dyn IntensityClusterer + Send + Sync>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clusterer,
            seeded_from_config: false,
        })
    }

    /// Load a JSON config and create a meter in one step.
    pub fn from_config_json_file(
        path: &Path,
    ) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(MeasureConfig::from_json_file(path)?)?)
    }

    pub fn config(&self) -> &MeasureConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// The new config is validated first; on error the meter keeps its
    /// previous config. A meter built with [`ZoneMeter::new`] also rebuilds
    /// its k-means clusterer from the new attempts and seed. A clusterer
    /// passed to [`ZoneMeter::with_clusterer`] is kept as is.
    pub fn set_config(&mut self, config: MeasureConfig) -> Result<()> {
        config.validate()?;
        if self.seeded_from_config {
            self.clusterer = Box::new(KMeansClusterer::new(
                config.inhibition.kmeans_attempts,
                config.inhibition.kmeans_seed,
            ));
        }
        self.config = config;
        Ok(())
    }

    /// Build the measurement context of a cropped dish photograph.
    pub fn compute_measurement_context(
        &self,
        dish_image: &RgbImage,
        is_round: bool,
        circles: &[Circle],
    ) -> Result<MeasurementContext> {
        preprocess::compute_measurement_context(
            dish_image,
            is_round,
            circles,
            &self.config,
            self.clusterer.as_ref(),
        )
    }

    /// Build the measurement context of a segmented dish.
    pub fn compute_measurement_context_for_dish(
        &self,
        dish: &Dish,
        circles: &[Circle],
    ) -> Result<MeasurementContext> {
        self.compute_measurement_context(&dish.image, dish.is_round, circles)
    }

    /// Measure pellet `index`.
    pub fn estimate_diameter(
        &self,
        ctx: &MeasurementContext,
        index: usize,
        mode: MeasureMode,
    ) -> Result<InhibDisk> {
        diameter::estimate_diameter(ctx, index, mode, &self.config)
    }

    /// Inscribed reading of every pellet, in circle order.
    pub fn estimate_all_diameters(&self, ctx: &MeasurementContext) -> Result<Vec<InhibDisk>> {
        diameter::estimate_all_diameters(ctx, &self.config)
    }

    /// One result per pellet, in circle order.
    pub fn estimate_each_diameter(
        &self,
        ctx: &MeasurementContext,
        mode: MeasureMode,
    ) -> Vec<Result<InhibDisk>> {
        diameter::estimate_each_diameter(ctx, mode, &self.config)
    }

    /// Load (or reuse) the photograph at `path` and measure one pellet.
    ///
    /// Single-pellet convenience: only the decoded image is cached, the
    /// measurement context is rebuilt on every call. To measure several
    /// pellets of one dish, build the context once with
    /// [`ZoneMeter::compute_measurement_context`] and call
    /// [`ZoneMeter::estimate_each_diameter`].
    pub fn measure_pellet_at_path(
        &self,
        cache: &mut ImageCache,
        path: &Path,
        circles: &[Circle],
        index: usize,
        mode: MeasureMode,
        is_round: bool,
    ) -> Result<InhibDisk> {
        let image = cache.get_or_load(path)?;
        let ctx = self.compute_measurement_context(&image, is_round, circles)?;
        let disk = self.estimate_diameter(&ctx, index, mode)?;
        tracing::info!(
            path = %path.display(),
            pellet = index,
            %mode,
            diameter_mm = ?disk.diameter_mm,
            "pellet measured"
        );
        Ok(disk)
    }
}

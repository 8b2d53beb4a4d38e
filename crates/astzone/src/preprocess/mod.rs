//! Measurement-image construction.
//!
//! Turns a cropped dish photograph and its pellet circles into a
//! [`MeasurementContext`]: one standardized grayscale image (values in
//! [0, 1], masked pixels at -1) plus everything the per-pellet estimators
//! share (circles and ROIs in that image, global and local intensity levels,
//! scale factors).

pub(crate) mod transforms;

use image::{GenericImageView, RgbImage};

use crate::cluster::{ClusterCenters, IntensityClusterer};
use crate::config::MeasureConfig;
use crate::error::{MeasureError, Result};
use crate::geometry::{
    bounding_box_of_centers, compute_rois, min_enclosing_circle, px_per_mm, Circle, RoiRect,
};
use crate::radial_profile::{radial_profile, ProfileKind};
use crate::MeasureImage;

/// Everything the diameter estimators need for one dish.
///
/// Built once by [`compute_measurement_context`] and then only read; every
/// per-pellet measurement borrows it immutably.
#[derive(Debug, Clone)]
pub struct MeasurementContext {
    image: MeasureImage,
    circles: Vec<Circle>,
    rois: Vec<RoiRect>,
    global_centers: ClusterCenters,
    global_threshold: f32,
    local_centers: Vec<ClusterCenters>,
    local_thresholds: Vec<f32>,
    rescale_factor: f32,
    padding_px: u32,
    px_per_mm: f32,
    original_px_per_mm: f32,
}

impl MeasurementContext {
    /// Standardized image: [0, 1] intensities, -1 for masked pixels, pellets at 1.
    pub fn image(&self) -> &MeasureImage {
        &self.image
    }

    /// Pellet circles in the standardized image frame.
    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    /// Per-pellet ROIs, same order as [`Self::circles`].
    pub fn rois(&self) -> &[RoiRect] {
        &self.rois
    }

    /// Dish-wide inhibition/bacteria levels (0-255).
    pub fn global_centers(&self) -> &ClusterCenters {
        &self.global_centers
    }

    /// Midpoint of the global levels (0-255).
    pub fn global_threshold(&self) -> f32 {
        self.global_threshold
    }

    pub fn local_centers(&self) -> &[ClusterCenters] {
        &self.local_centers
    }

    /// Per-pellet decision level (0-255) at the configured sensitivity.
    pub fn local_thresholds(&self) -> &[f32] {
        &self.local_thresholds
    }

    /// Scale applied to the photograph (never above 1).
    pub fn rescale_factor(&self) -> f32 {
        self.rescale_factor
    }

    pub fn padding_px(&self) -> u32 {
        self.padding_px
    }

    /// Resolution of the standardized image.
    pub fn px_per_mm(&self) -> f32 {
        self.px_per_mm
    }

    /// Resolution of the input photograph.
    pub fn original_px_per_mm(&self) -> f32 {
        self.original_px_per_mm
    }

    pub fn pellet_count(&self) -> usize {
        self.circles.len()
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.circles.len() {
            return Err(MeasureError::PelletIndexOutOfRange {
                index,
                count: self.circles.len(),
            });
        }
        Ok(())
    }

    /// Radial profile of pellet `index` over its ROI.
    pub fn radial_profile(
        &self,
        index: usize,
        kind: ProfileKind,
        threshold: f32,
    ) -> Result<Vec<f32>> {
        self.check_index(index)?;
        let roi = self.rois[index];
        let sub = self.image.view(roi.x, roi.y, roi.width, roi.height).to_image();
        radial_profile(&sub, kind, self.px_per_mm, threshold)
    }
}

/// Integer image rectangle covering `[x0, x1] x [y0, y1]`, or a geometry
/// error if it does not fit in a `width` x `height` image.
fn region_in_image(
    region: &'static str,
    bounds: [f32; 4],
    width: u32,
    height: u32,
) -> Result<RoiRect> {
    let [x0, y0, x1, y1] = bounds;
    let left = x0.floor();
    let top = y0.floor();
    let right = x1.ceil();
    let bottom = y1.ceil();
    if left < 0.0
        || top < 0.0
        || right > width as f32
        || bottom > height as f32
        || right <= left
        || bottom <= top
    {
        return Err(MeasureError::RegionOutOfBounds {
            region,
            x0,
            y0,
            x1,
            y1,
            width,
            height,
        });
    }
    Ok(RoiRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

/// Working and strict regions in the photograph.
struct DishRegions {
    working: RoiRect,
    strict: RoiRect,
}

fn dish_regions(
    circles: &[Circle],
    is_round: bool,
    width: u32,
    height: u32,
    max_r: f32,
    border: f32,
) -> Result<DishRegions> {
    if is_round {
        let cx = (width / 2) as f32;
        let cy = (height / 2) as f32;
        let max_dist = circles
            .iter()
            .map(|c| ((c.center[0] - cx).powi(2) + (c.center[1] - cy).powi(2)).sqrt())
            .fold(0.0f32, f32::max);
        let square = |r: f32| [cx - r, cy - r, cx + r, cy + r];
        Ok(DishRegions {
            working: region_in_image("working", square(max_dist + border), width, height)?,
            strict: region_in_image("strict", square(max_dist + max_r), width, height)?,
        })
    } else {
        let [x0, y0, x1, y1] = bounding_box_of_centers(circles);
        let grow = |d: f32| [x0 - d, y0 - d, x1 + d, y1 + d];
        Ok(DishRegions {
            working: region_in_image("working", grow(border), width, height)?,
            strict: region_in_image("strict", grow(max_r), width, height)?,
        })
    }
}

/// Build the measurement context of one dish.
///
/// `dish_image` is the cropped dish photograph, `circles` the pellets in its
/// pixel frame. Fails without partial result on degenerate geometry or when
/// there is nothing to cluster.
pub fn compute_measurement_context(
    dish_image: &RgbImage,
    is_round: bool,
    circles: &[Circle],
    config: &MeasureConfig,
    clusterer: &dyn IntensityClusterer,
) -> Result<MeasurementContext> {
    let (width, height) = dish_image.dimensions();
    if width == 0 || height == 0 {
        return Err(MeasureError::EmptyImage { what: "dish" });
    }
    if circles.is_empty() {
        return Err(MeasureError::NoPellets);
    }
    let inhib = &config.inhibition;

    let gray = transforms::to_gray(dish_image, config.dish.growth_medium);
    let original_px_per_mm = px_per_mm(circles, config.pellets.diameter_mm)?;
    let gray = transforms::stretch_levels(&transforms::paint_disks(&gray, circles, u8::MAX));

    let max_r = circles.iter().map(|c| c.radius).fold(0.0f32, f32::max);
    let border = max_r + original_px_per_mm * config.dish.border_pellet_distance_mm;
    let regions = dish_regions(circles, is_round, width, height, max_r, border)?;
    tracing::trace!(working = ?regions.working, strict = ?regions.strict, "dish regions");

    let (px_per_mm, resize_f) = if inhib.standardized_px_per_mm < original_px_per_mm {
        (
            inhib.standardized_px_per_mm,
            inhib.standardized_px_per_mm / original_px_per_mm,
        )
    } else {
        (original_px_per_mm, 1.0)
    };

    let kernel = transforms::median_kernel_size(px_per_mm);
    let crop = transforms::median_blur(&transforms::crop(&gray, regions.working), kernel);
    let crop_strict = transforms::median_blur(&transforms::crop(&gray, regions.strict), kernel);
    let levels = transforms::level_range(&crop);
    let pellet_level = inhib.min_pellet_intensity as f32 / 255.0;

    // Dish-wide levels, from the strict crop only.
    let mut strict = transforms::to_unit_range(&crop_strict, levels);
    if is_round {
        let (w, h) = strict.dimensions();
        let center = [(w / 2) as f32, (h / 2) as f32];
        strict = transforms::mask_outside_circle(&strict, center, (h / 2) as f32);
    }
    let strict = transforms::mask_bright(&strict, pellet_level);
    let global_samples = transforms::cluster_samples(&strict, inhib.clustering_max_side_px);
    let global_centers = clusterer
        .two_levels(&global_samples)
        .ok_or_else(|| MeasureError::NoClusterSamples {
            what: "dish".to_string(),
        })?;
    let global_threshold = global_centers.midpoint();
    tracing::debug!(
        inhibition = global_centers.inhibition,
        bacteria = global_centers.bacteria,
        samples = global_samples.len(),
        "global levels"
    );
    if global_centers.contrast() < inhib.min_contrast {
        tracing::warn!(
            contrast = global_centers.contrast(),
            min_contrast = inhib.min_contrast,
            "low bacteria/inhibition contrast on the whole dish"
        );
    }

    let mut std_img = transforms::to_unit_range(&crop, levels);
    if is_round {
        let (w, h) = std_img.dimensions();
        let center = [(w / 2) as f32, (h / 2) as f32];
        std_img = transforms::mask_outside_circle(&std_img, center, (h / 2) as f32);
    }
    let std_img = transforms::mask_bright(&std_img, pellet_level);
    let std_img = transforms::rescale(&std_img, resize_f);
    let padding_px = (config.max_radius_mm() * px_per_mm + px_per_mm).round() as u32;
    let std_img = transforms::pad_masked(&std_img, padding_px);
    tracing::trace!(w = std_img.width(), h = std_img.height(), padding_px, "standardized image");

    let pad = padding_px as f32;
    let new_circles: Vec<Circle> = circles
        .iter()
        .map(|c| Circle {
            center: [
                (c.center[0] - regions.working.x as f32) * resize_f + pad,
                (c.center[1] - regions.working.y as f32) * resize_f + pad,
            ],
            radius: c.radius * resize_f,
        })
        .collect();

    // Local clustering only sees the dish interior spanned by the pellets.
    let scaled_max_r = max_r * resize_f;
    let std_strict = if is_round {
        let centers: Vec<[f32; 2]> = new_circles.iter().map(|c| c.center).collect();
        let (center, radius) = min_enclosing_circle(&centers);
        transforms::mask_outside_circle(&std_img, center, radius + scaled_max_r)
    } else {
        let [x0, y0, x1, y1] = bounding_box_of_centers(&new_circles);
        transforms::mask_outside_rect(
            &std_img,
            [x0 - scaled_max_r, y0 - scaled_max_r, x1 + scaled_max_r, y1 + scaled_max_r],
        )
    };

    let roi_allowance = (config.max_radius_mm() + 2.0) * px_per_mm;
    let rois = compute_rois(&new_circles, std_img.width(), std_img.height(), roi_allowance)?;

    let mut local_centers = Vec::with_capacity(rois.len());
    let mut local_thresholds = Vec::with_capacity(rois.len());
    for (i, roi) in rois.iter().enumerate() {
        let sub = std_strict.view(roi.x, roi.y, roi.width, roi.height).to_image();
        let samples = transforms::cluster_samples(&sub, inhib.clustering_max_side_px);
        let centers = clusterer
            .two_levels(&samples)
            .ok_or_else(|| MeasureError::NoClusterSamples {
                what: format!("roi of pellet {i}"),
            })?;
        let threshold = centers.threshold(inhib.sensitivity);
        tracing::debug!(
            pellet = i,
            inhibition = centers.inhibition,
            bacteria = centers.bacteria,
            threshold,
            "local levels"
        );
        local_centers.push(centers);
        local_thresholds.push(threshold);
    }

    let image = transforms::paint_disks_f32(&std_img, &new_circles, 1.0);
    tracing::info!(
        pellets = new_circles.len(),
        px_per_mm,
        original_px_per_mm,
        resize_f,
        "measurement context ready"
    );

    Ok(MeasurementContext {
        image,
        circles: new_circles,
        rois,
        global_centers,
        global_threshold,
        local_centers,
        local_thresholds,
        rescale_factor: resize_f,
        padding_px,
        px_per_mm,
        original_px_per_mm,
    })
}

#[cfg(test)]
impl MeasurementContext {
    /// Assemble a context directly from a standardized image.
    pub(crate) fn from_parts(
        image: MeasureImage,
        circles: Vec<Circle>,
        global_centers: ClusterCenters,
        local_centers: Vec<ClusterCenters>,
        sensitivity: f32,
        px_per_mm: f32,
        roi_allowance_px: f32,
    ) -> Result<Self> {
        let rois = compute_rois(&circles, image.width(), image.height(), roi_allowance_px)?;
        let local_thresholds = local_centers.iter().map(|c| c.threshold(sensitivity)).collect();
        Ok(Self {
            image,
            circles,
            rois,
            global_threshold: global_centers.midpoint(),
            global_centers,
            local_centers,
            local_thresholds,
            rescale_factor: 1.0,
            padding_px: 0,
            px_per_mm,
            original_px_per_mm: px_per_mm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KMeansClusterer;
    use crate::test_utils::{phantom_dish, Phantom};
    use approx::assert_relative_eq;
    use transforms::MASKED;

    fn context_of(phantom: &Phantom, config: &MeasureConfig) -> Result<MeasurementContext> {
        compute_measurement_context(
            &phantom.image,
            phantom.is_round,
            &phantom.circles,
            config,
            &KMeansClusterer::default(),
        )
    }

    #[test]
    fn rectangular_dish_context() {
        let phantom = phantom_dish(&[25.0, 25.0, 25.0, 25.0], 10.0);
        let config = MeasureConfig::default();
        let ctx = context_of(&phantom, &config).unwrap();

        assert_relative_eq!(ctx.original_px_per_mm(), 10.0, epsilon = 1e-4);
        assert_relative_eq!(ctx.px_per_mm(), 10.0, epsilon = 1e-4);
        assert_eq!(ctx.rescale_factor(), 1.0);
        // 20 mm max radius + 1 mm.
        assert_eq!(ctx.padding_px(), 210);
        assert_eq!(ctx.pellet_count(), 4);
        assert_eq!(ctx.rois().len(), 4);

        // Circles keep their size and move with the crop and the padding.
        let c0 = ctx.circles()[0];
        assert_relative_eq!(c0.radius, 30.0);
        let working_x = phantom.circles[0].center[0] - 50.0;
        assert_relative_eq!(c0.center[0], phantom.circles[0].center[0] - working_x + 210.0);

        // Pellets are painted at 1, padding is masked.
        let [px, py] = c0.center;
        assert_eq!(ctx.image().get_pixel(px as u32, py as u32)[0], 1.0);
        assert_eq!(ctx.image().get_pixel(0, 0)[0], MASKED);

        // Zone and lawn levels: 60 and 140 stretched against the white pellets.
        let g = ctx.global_centers();
        assert!(g.inhibition < 5.0, "{g:?}");
        assert!((g.bacteria - 104.6).abs() < 3.0, "{g:?}");
        assert_relative_eq!(ctx.global_threshold(), g.midpoint());
        for (c, t) in ctx.local_centers().iter().zip(ctx.local_thresholds()) {
            assert!(c.contrast() > 80.0, "{c:?}");
            // Configured sensitivity 0 puts the level on the bacteria center.
            assert_relative_eq!(*t, c.bacteria);
        }
    }

    #[test]
    fn coarse_photo_is_downscaled() {
        let phantom = phantom_dish(&[20.0, 20.0, 20.0, 20.0], 20.0);
        let config = MeasureConfig::default();
        let ctx = context_of(&phantom, &config).unwrap();
        assert_relative_eq!(ctx.original_px_per_mm(), 20.0, epsilon = 1e-3);
        assert_relative_eq!(ctx.rescale_factor(), 0.5, epsilon = 1e-4);
        assert_relative_eq!(ctx.px_per_mm(), 10.0);
        assert_relative_eq!(ctx.circles()[0].radius, 30.0, epsilon = 1e-3);
    }

    #[test]
    fn pellets_near_the_edge_leave_the_working_region() {
        let mut phantom = phantom_dish(&[20.0, 20.0, 20.0, 20.0], 10.0);
        phantom.circles[0].center = [40.0, 200.0];
        let err = context_of(&phantom, &MeasureConfig::default()).unwrap_err();
        assert!(matches!(err, MeasureError::RegionOutOfBounds { region: "working", .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Geometry);
    }

    #[test]
    fn round_dish_masks_the_rim() {
        let mut phantom = phantom_dish(&[20.0, 20.0, 20.0, 20.0], 10.0);
        phantom.is_round = true;
        let ctx = context_of(&phantom, &MeasureConfig::default()).unwrap();
        // Working region is a square around the image center; its corners
        // fall outside the inscribed circle.
        let pad = ctx.padding_px();
        assert_eq!(ctx.image().get_pixel(pad + 2, pad + 2)[0], MASKED);
        assert_eq!(ctx.pellet_count(), 4);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let phantom = phantom_dish(&[20.0], 10.0);
        let config = MeasureConfig::default();
        let err = compute_measurement_context(
            &phantom.image,
            false,
            &[],
            &config,
            &KMeansClusterer::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MeasureError::NoPellets));

        let err = compute_measurement_context(
            &RgbImage::new(0, 0),
            false,
            &phantom.circles,
            &config,
            &KMeansClusterer::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MeasureError::EmptyImage { .. }));
    }

    #[test]
    fn out_of_range_pellet_profile() {
        let phantom = phantom_dish(&[20.0, 20.0, 20.0, 20.0], 10.0);
        let ctx = context_of(&phantom, &MeasureConfig::default()).unwrap();
        let err = ctx.radial_profile(9, ProfileKind::Mean, 0.0).unwrap_err();
        assert!(matches!(err, MeasureError::PelletIndexOutOfRange { index: 9, count: 4 }));
        let p = ctx.radial_profile(0, ProfileKind::Mean, 0.0).unwrap();
        assert_eq!(p.len(), ctx.rois()[0].height as usize / 2 + 1);
    }
}

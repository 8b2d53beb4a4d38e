//! Synthetic images shared by unit tests.

use image::{Luma, Rgb, RgbImage};

use crate::geometry::Circle;
use crate::MeasureImage;

pub(crate) const BACTERIA_GRAY: u8 = 140;
pub(crate) const ZONE_GRAY: u8 = 60;
pub(crate) const PELLET_GRAY: u8 = 255;

/// Physical pellet diameter used by the phantoms (mm).
const PELLET_MM: f32 = 6.0;
/// Center-to-center pellet spacing (mm).
const SPACING_MM: f32 = 30.0;
/// Distance from the outer pellet centers to the image edge (mm).
const MARGIN_MM: f32 = 20.0;

pub(crate) fn fill_image(w: u32, h: u32, value: f32) -> MeasureImage {
    MeasureImage::from_pixel(w, h, Luma([value]))
}

/// Square image holding a disk: `inside` where `d <= radius`, `outside` elsewhere.
pub(crate) fn disk_image(
    size: u32,
    center: [f32; 2],
    radius: f32,
    inside: f32,
    outside: f32,
) -> MeasureImage {
    MeasureImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - center[0];
        let dy = y as f32 - center[1];
        if (dx * dx + dy * dy).sqrt() <= radius {
            Luma([inside])
        } else {
            Luma([outside])
        }
    })
}

/// A synthetic antibiogram photograph with known zone diameters.
pub(crate) struct Phantom {
    pub image: RgbImage,
    pub circles: Vec<Circle>,
    pub is_round: bool,
}

/// Rectangular dish with one pellet per entry of `zone_diameters_mm`, laid
/// out row-major on a square grid, each surrounded by a uniform zone of the
/// given diameter on a uniform lawn.
pub(crate) fn phantom_dish(zone_diameters_mm: &[f32], px_per_mm: f32) -> Phantom {
    let n = zone_diameters_mm.len();
    let cols = (n as f32).sqrt().ceil().max(1.0) as usize;
    let rows = n.div_ceil(cols);
    let spacing = SPACING_MM * px_per_mm;
    let margin = MARGIN_MM * px_per_mm;
    let w = (2.0 * margin + spacing * (cols - 1) as f32).round() as u32;
    let h = (2.0 * margin + spacing * (rows.max(1) - 1) as f32).round() as u32;
    let pellet_r = PELLET_MM / 2.0 * px_per_mm;

    let circles: Vec<Circle> = (0..n)
        .map(|i| {
            let (row, col) = (i / cols, i % cols);
            Circle::new(
                margin + spacing * col as f32,
                margin + spacing * row as f32,
                pellet_r,
            )
        })
        .collect();

    let image = RgbImage::from_fn(w, h, |x, y| {
        let mut gray = BACTERIA_GRAY;
        for (c, &diam) in circles.iter().zip(zone_diameters_mm) {
            let dx = x as f32 - c.center[0];
            let dy = y as f32 - c.center[1];
            let d = (dx * dx + dy * dy).sqrt();
            if d <= c.radius {
                gray = PELLET_GRAY;
                break;
            }
            if d <= diam / 2.0 * px_per_mm {
                gray = ZONE_GRAY;
            }
        }
        Rgb([gray, gray, gray])
    });

    Phantom {
        image,
        circles,
        is_round: false,
    }
}

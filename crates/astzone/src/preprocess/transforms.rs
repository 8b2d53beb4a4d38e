//! Image stages of the preprocessor. Every function returns a new image.

use image::imageops;
use image::{GenericImageView, GrayImage, Luma, RgbImage};

use crate::config::GrowthMedium;
use crate::geometry::{Circle, RoiRect};
use crate::MeasureImage;

/// Value of masked (excluded) pixels in a measurement image.
pub(crate) const MASKED: f32 = -1.0;

/// Grayscale conversion for the given medium.
///
/// Blood agar gets its red channel replaced by the green one first.
pub(crate) fn to_gray(rgb: &RgbImage, medium: GrowthMedium) -> GrayImage {
    let (w, h) = rgb.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let r = match medium {
            GrowthMedium::Blood => g,
            GrowthMedium::MuellerHinton => r,
        };
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Fill every circle with `value` (covers pellet label text).
pub(crate) fn paint_disks(gray: &GrayImage, circles: &[Circle], value: u8) -> GrayImage {
    let mut out = gray.clone();
    for c in circles {
        imageproc::drawing::draw_filled_circle_mut(
            &mut out,
            (c.center[0].round() as i32, c.center[1].round() as i32),
            c.radius.round() as i32,
            Luma([value]),
        );
    }
    out
}

/// Stretch levels to the full 0-255 range.
pub(crate) fn stretch_levels(gray: &GrayImage) -> GrayImage {
    let (lo, hi) = level_range(gray);
    if hi <= lo {
        return GrayImage::new(gray.width(), gray.height());
    }
    let span = (hi - lo) as f32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = (gray.get_pixel(x, y)[0] - lo) as f32 / span * 255.0;
        Luma([v.round() as u8])
    })
}

pub(crate) fn crop(gray: &GrayImage, rect: RoiRect) -> GrayImage {
    gray.view(rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Odd median kernel of about half a millimeter, at least 3.
pub(crate) fn median_kernel_size(px_per_mm: f32) -> u32 {
    let k = (px_per_mm / 2.0).max(3.0).floor() as u32;
    if k % 2 == 0 {
        k + 1
    } else {
        k
    }
}

pub(crate) fn median_blur(gray: &GrayImage, kernel: u32) -> GrayImage {
    let radius = kernel / 2;
    imageproc::filter::median_filter(gray, radius, radius)
}

/// Map `gray` to [0, 1] using the `levels` range `(min, max)`.
pub(crate) fn to_unit_range(gray: &GrayImage, levels: (u8, u8)) -> MeasureImage {
    let (lo, hi) = levels;
    let span = hi.saturating_sub(lo) as f32;
    MeasureImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        if span == 0.0 {
            Luma([0.0])
        } else {
            Luma([((v as f32 - lo as f32) / span).clamp(0.0, 1.0)])
        }
    })
}

/// `(min, max)` gray level of an image.
pub(crate) fn level_range(gray: &GrayImage) -> (u8, u8) {
    gray.pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])))
}

/// Mask every pixel outside the circle `(center, radius)`.
pub(crate) fn mask_outside_circle(
    img: &MeasureImage,
    center: [f32; 2],
    radius: f32,
) -> MeasureImage {
    let r2 = radius * radius;
    MeasureImage::from_fn(img.width(), img.height(), |x, y| {
        let dx = x as f32 - center[0];
        let dy = y as f32 - center[1];
        if dx * dx + dy * dy <= r2 {
            *img.get_pixel(x, y)
        } else {
            Luma([MASKED])
        }
    })
}

/// Mask every pixel outside `[x0, x1] x [y0, y1]`.
pub(crate) fn mask_outside_rect(img: &MeasureImage, bounds: [f32; 4]) -> MeasureImage {
    let [x0, y0, x1, y1] = bounds;
    MeasureImage::from_fn(img.width(), img.height(), |x, y| {
        let (xf, yf) = (x as f32, y as f32);
        if xf >= x0 && xf <= x1 && yf >= y0 && yf <= y1 {
            *img.get_pixel(x, y)
        } else {
            Luma([MASKED])
        }
    })
}

/// Mask pixels at or above `level` (pellet material).
pub(crate) fn mask_bright(img: &MeasureImage, level: f32) -> MeasureImage {
    MeasureImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y)[0];
        Luma([if v >= level { MASKED } else { v }])
    })
}

/// Scale both sides by `factor` with bilinear interpolation on pixel
/// centers. A factor of 1 copies.
///
/// Masked pixels are interpolated like any other value. A sample blending
/// a masked pixel is pulled toward -1 and usually falls below 0, which
/// excludes it. One that mixes in only a small masked weight can stay
/// non-negative with a darkened value.
pub(crate) fn rescale(img: &MeasureImage, factor: f32) -> MeasureImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return img.clone();
    }
    let (sw, sh) = img.dimensions();
    let w = ((sw as f32 * factor).round() as u32).max(1);
    let h = ((sh as f32 * factor).round() as u32).max(1);
    let fx = sw as f32 / w as f32;
    let fy = sh as f32 / h as f32;
    let max_x = (sw - 1) as f32;
    let max_y = (sh - 1) as f32;
    MeasureImage::from_fn(w, h, |x, y| {
        let src_x = ((x as f32 + 0.5) * fx - 0.5).clamp(0.0, max_x);
        let src_y = ((y as f32 + 0.5) * fy - 0.5).clamp(0.0, max_y);
        let x0 = src_x.floor() as u32;
        let y0 = src_y.floor() as u32;
        let x1 = (x0 + 1).min(sw - 1);
        let y1 = (y0 + 1).min(sh - 1);
        let tx = src_x - x0 as f32;
        let ty = src_y - y0 as f32;
        let top = img.get_pixel(x0, y0)[0] * (1.0 - tx) + img.get_pixel(x1, y0)[0] * tx;
        let bottom = img.get_pixel(x0, y1)[0] * (1.0 - tx) + img.get_pixel(x1, y1)[0] * tx;
        Luma([top * (1.0 - ty) + bottom * ty])
    })
}

/// Surround the image with a `pad`-pixel masked border.
pub(crate) fn pad_masked(img: &MeasureImage, pad: u32) -> MeasureImage {
    let mut out =
        MeasureImage::from_pixel(img.width() + 2 * pad, img.height() + 2 * pad, Luma([MASKED]));
    imageops::replace(&mut out, img, pad as i64, pad as i64);
    out
}

/// Fill every circle with `value` in a measurement image.
pub(crate) fn paint_disks_f32(img: &MeasureImage, circles: &[Circle], value: f32) -> MeasureImage {
    let mut out = img.clone();
    for c in circles {
        imageproc::drawing::draw_filled_circle_mut(
            &mut out,
            (c.center[0].round() as i32, c.center[1].round() as i32),
            c.radius.round() as i32,
            Luma([value]),
        );
    }
    out
}

/// Unmasked pixels on the 0-255 scale, after shrinking the image so its
/// longest side is at most `max_side`.
///
/// Shrinking picks the nearest source pixel, which keeps masked pixels out of
/// the valid range.
pub(crate) fn cluster_samples<I>(img: &I, max_side: u32) -> Vec<u8>
where
    I: GenericImageView<Pixel = Luma<f32>>,
{
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    let (nw, nh, step) = if longest > max_side {
        let step = longest as f32 / max_side as f32;
        (
            ((w as f32 / step).round() as u32).max(1),
            ((h as f32 / step).round() as u32).max(1),
            step,
        )
    } else {
        (w, h, 1.0)
    };

    let mut out = Vec::with_capacity((nw * nh) as usize);
    for y in 0..nh {
        let sy = (((y as f32 + 0.5) * step) as u32).min(h - 1);
        for x in 0..nw {
            let sx = (((x as f32 + 0.5) * step) as u32).min(w - 1);
            let v = img.get_pixel(sx, sy)[0];
            if v >= 0.0 {
                out.push((v * 255.0).round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    out
}

//! Pellet geometry: circles, per-pellet regions of interest and image scale.

use nalgebra::{Matrix2, Point2, Vector2};

use crate::error::{MeasureError, Result};

/// A pellet circle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Circle {
    /// Center (x, y) in pixels.
    pub center: [f32; 2],
    /// Radius in pixels.
    pub radius: f32,
}

impl Circle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: [x, y],
            radius,
        }
    }
}

/// Axis-aligned integer rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoiRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiRect {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Distance from each circle center to its nearest neighbour center.
///
/// Uses the Chebyshev metric (`max(|dx|, |dy|)`), which keeps the square
/// ROIs built from it disjoint. A lone circle gets `f32::INFINITY`.
pub(crate) fn first_neighbour_distance(circles: &[Circle]) -> Vec<f32> {
    circles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            circles
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| {
                    let dx = (a.center[0] - b.center[0]).abs();
                    let dy = (a.center[1] - b.center[1]).abs();
                    dx.max(dy)
                })
                .fold(f32::INFINITY, f32::min)
        })
        .collect()
}

/// Compute one square ROI per pellet, as large as possible without reaching
/// a neighbouring pellet and never larger than `max_radius_px`.
///
/// ROIs are clipped to a `width` x `height` image. Pellets closer to each
/// other than their own radius, or ROIs that end up empty after clipping,
/// are reported as geometry errors.
pub fn compute_rois(
    circles: &[Circle],
    width: u32,
    height: u32,
    max_radius_px: f32,
) -> Result<Vec<RoiRect>> {
    let fnd = first_neighbour_distance(circles);
    let ncols = width as i64;
    let nrows = height as i64;

    let mut rois = Vec::with_capacity(circles.len());
    for (index, (circle, nd)) in circles.iter().zip(&fnd).enumerate() {
        let cx = circle.center[0].round() as i64;
        let cy = circle.center[1].round() as i64;
        let r = if circles.len() == 1 {
            max_radius_px.round() as i64
        } else {
            // A neighbour inside the pellet radius, even by a fraction of a
            // pixel, would otherwise round to a 1 px ROI.
            let reach = nd - circle.radius;
            if reach < 0.0 {
                return Err(MeasureError::PelletsTooClose {
                    index,
                    radius_px: reach.floor() as i64,
                });
            }
            reach.min(max_radius_px).round() as i64
        };

        let roi_width = 2 * r + 1;
        if roi_width < 0 {
            return Err(MeasureError::PelletsTooClose {
                index,
                radius_px: r,
            });
        }

        let left = (cx - r).max(0);
        let top = (cy - r).max(0);
        let right = (cx - r + roi_width).min(ncols - 1);
        let bottom = (cy - r + roi_width).min(nrows - 1);
        if right < left || bottom < top {
            return Err(MeasureError::DegenerateRoi {
                index,
                left,
                top,
                right,
                bottom,
            });
        }

        rois.push(RoiRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        });
    }
    Ok(rois)
}

/// Image resolution implied by the pellets: physical pellet diameter over
/// the mean pellet diameter in pixels.
pub fn mm_per_px(circles: &[Circle], pellet_diameter_mm: f32) -> Result<f32> {
    if circles.is_empty() {
        return Err(MeasureError::NoPellets);
    }
    let mean_diameter_px =
        2.0 * circles.iter().map(|c| c.radius).sum::<f32>() / circles.len() as f32;
    Ok(pellet_diameter_mm / mean_diameter_px)
}

/// Inverse of [`mm_per_px`].
pub fn px_per_mm(circles: &[Circle], pellet_diameter_mm: f32) -> Result<f32> {
    Ok(1.0 / mm_per_px(circles, pellet_diameter_mm)?)
}

/// Axis-aligned bounds `[x_min, y_min, x_max, y_max]` of a point set.
pub(crate) fn bounding_box_of_centers(circles: &[Circle]) -> [f32; 4] {
    circles.iter().fold(
        [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY],
        |b, c| {
            [
                b[0].min(c.center[0]),
                b[1].min(c.center[1]),
                b[2].max(c.center[0]),
                b[3].max(c.center[1]),
            ]
        },
    )
}

/// Smallest circle enclosing all points (incremental Welzl construction).
///
/// Returns `(center, radius)`. An empty input yields a zero circle at the origin.
pub(crate) fn min_enclosing_circle(points: &[[f32; 2]]) -> ([f32; 2], f32) {
    let pts: Vec<Point2<f64>> = points
        .iter()
        .map(|p| Point2::new(p[0] as f64, p[1] as f64))
        .collect();
    let Some(&first) = pts.first() else {
        return ([0.0, 0.0], 0.0);
    };

    let eps = 1e-7;
    let mut c = first;
    let mut r = 0.0f64;
    for i in 1..pts.len() {
        if (pts[i] - c).norm() <= r + eps {
            continue;
        }
        c = pts[i];
        r = 0.0;
        for j in 0..i {
            if (pts[j] - c).norm() <= r + eps {
                continue;
            }
            c = nalgebra::center(&pts[i], &pts[j]);
            r = (pts[i] - c).norm();
            for k in 0..j {
                if (pts[k] - c).norm() <= r + eps {
                    continue;
                }
                match circumcenter(&pts[i], &pts[j], &pts[k]) {
                    Some(cc) => {
                        c = cc;
                        r = (pts[i] - c).norm();
                    }
                    None => {
                        // Collinear: the two farthest points span the circle.
                        let pairs = [(pts[i], pts[j]), (pts[i], pts[k]), (pts[j], pts[k])];
                        let (a, b) = pairs
                            .into_iter()
                            .max_by(|x, y| {
                                (x.0 - x.1).norm().total_cmp(&(y.0 - y.1).norm())
                            })
                            .unwrap_or((pts[i], pts[j]));
                        c = nalgebra::center(&a, &b);
                        r = (a - c).norm();
                    }
                }
            }
        }
    }
    ([c.x as f32, c.y as f32], r as f32)
}

fn circumcenter(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<Point2<f64>> {
    // |p - a|^2 = |p - b|^2 = |p - c|^2 as a 2x2 linear system in p.
    let ab = b - a;
    let ac = c - a;
    let m = Matrix2::new(ab.x, ab.y, ac.x, ac.y) * 2.0;
    let rhs = Vector2::new(
        b.coords.norm_squared() - a.coords.norm_squared(),
        c.coords.norm_squared() - a.coords.norm_squared(),
    );
    let inv = m.try_inverse()?;
    let p = inv * rhs;
    if p.iter().all(|v| v.is_finite()) {
        Some(Point2::from(p))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn neighbour_distance_is_chebyshev() {
        let circles = [
            Circle::new(100.0, 100.0, 10.0),
            Circle::new(130.0, 140.0, 10.0),
            Circle::new(300.0, 100.0, 10.0),
        ];
        let fnd = first_neighbour_distance(&circles);
        assert_relative_eq!(fnd[0], 40.0);
        assert_relative_eq!(fnd[1], 40.0);
        assert_relative_eq!(fnd[2], 170.0);
    }

    #[test]
    fn rois_stop_short_of_the_neighbour() {
        let circles = [
            Circle::new(100.0, 100.0, 10.0),
            Circle::new(200.0, 100.0, 10.0),
        ];
        let rois = compute_rois(&circles, 400, 300, 1000.0).unwrap();
        // r = 100 - 10 = 90, clipped on the left/top by the image border.
        assert_eq!(
            rois[0],
            RoiRect {
                x: 10,
                y: 10,
                width: 181,
                height: 181
            }
        );
        assert_eq!(rois[1].x, 110);
        assert_eq!(rois[1].width, 181);
    }

    #[test]
    fn rois_are_capped_by_the_max_radius() {
        let circles = [
            Circle::new(200.0, 200.0, 10.0),
            Circle::new(600.0, 200.0, 10.0),
        ];
        let rois = compute_rois(&circles, 800, 400, 50.0).unwrap();
        assert_eq!(
            rois[0],
            RoiRect {
                x: 150,
                y: 150,
                width: 101,
                height: 101
            }
        );
    }

    #[test]
    fn single_pellet_uses_the_full_allowance() {
        let circles = [Circle::new(200.0, 200.0, 20.0)];
        let rois = compute_rois(&circles, 400, 400, 120.4).unwrap();
        assert_eq!(
            rois[0],
            RoiRect {
                x: 80,
                y: 80,
                width: 241,
                height: 241
            }
        );
    }

    #[test]
    fn overlapping_pellets_are_a_geometry_error() {
        let circles = [
            Circle::new(100.0, 100.0, 30.0),
            Circle::new(105.0, 100.0, 30.0),
        ];
        let err = compute_rois(&circles, 400, 400, 200.0).unwrap_err();
        assert!(matches!(err, MeasureError::PelletsTooClose { index: 0, .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Geometry);
    }

    #[test]
    fn neighbour_just_inside_the_pellet_radius_is_too_close() {
        let circles = [
            Circle::new(100.0, 100.0, 10.0),
            Circle::new(109.7, 100.0, 10.0),
        ];
        let err = compute_rois(&circles, 400, 400, 200.0).unwrap_err();
        assert!(matches!(
            err,
            MeasureError::PelletsTooClose {
                index: 0,
                radius_px: -1
            }
        ));

        let touching = [
            Circle::new(100.0, 100.0, 10.0),
            Circle::new(110.0, 100.0, 10.0),
        ];
        let rois = compute_rois(&touching, 400, 400, 200.0).unwrap();
        assert_eq!(rois[0].width, 1);
    }

    #[test]
    fn pellet_outside_the_image_is_a_degenerate_roi() {
        let circles = [
            Circle::new(100.0, 100.0, 5.0),
            Circle::new(900.0, 100.0, 5.0),
        ];
        let err = compute_rois(&circles, 300, 300, 20.0).unwrap_err();
        assert!(matches!(err, MeasureError::DegenerateRoi { index: 1, .. }));
    }

    #[test]
    fn scale_from_mean_pellet_radius() {
        let circles = [Circle::new(0.0, 0.0, 29.0), Circle::new(0.0, 0.0, 31.0)];
        assert_relative_eq!(mm_per_px(&circles, 6.0).unwrap(), 0.1, epsilon = 1e-6);
        assert_relative_eq!(px_per_mm(&circles, 6.0).unwrap(), 10.0, epsilon = 1e-4);
        assert!(matches!(mm_per_px(&[], 6.0), Err(MeasureError::NoPellets)));
    }

    #[test]
    fn enclosing_circle_of_a_square_and_a_triangle() {
        let (c, r) = min_enclosing_circle(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        assert_relative_eq!(c[0], 5.0, epsilon = 1e-4);
        assert_relative_eq!(c[1], 5.0, epsilon = 1e-4);
        assert_relative_eq!(r, 50f32.sqrt(), epsilon = 1e-4);

        // Obtuse triangle: the long side is the diameter.
        let (c, r) = min_enclosing_circle(&[[0.0, 0.0], [10.0, 0.0], [5.0, 1.0]]);
        assert_relative_eq!(c[0], 5.0, epsilon = 1e-4);
        assert_relative_eq!(c[1], 0.0, epsilon = 1e-4);
        assert_relative_eq!(r, 5.0, epsilon = 1e-4);

        let (_, r) = min_enclosing_circle(&[[3.0, 4.0]]);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn center_bounds() {
        let b = bounding_box_of_centers(&[
            Circle::new(5.0, 9.0, 1.0),
            Circle::new(-2.0, 12.0, 1.0),
        ]);
        assert_eq!(b, [-2.0, 9.0, 5.0, 12.0]);
    }
}

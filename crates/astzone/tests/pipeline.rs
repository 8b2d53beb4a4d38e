//! End-to-end measurements on synthetic antibiogram photographs.

use astzone::{Circle, MeasureConfig, MeasureMode, ZoneMeter, ZoneOutcome};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

const PX_PER_MM: f32 = 10.0;
const LAWN: Rgb<u8> = Rgb([150, 140, 120]);
const CLEAR_AGAR: Rgb<u8> = Rgb([70, 60, 45]);
const PELLET: Rgb<u8> = Rgb([255, 255, 255]);

/// Rectangular dish, 30 mm pellet pitch, zones drawn with the given diameters.
fn photograph(zone_diameters_mm: &[f32]) -> (RgbImage, Vec<Circle>) {
    let n = zone_diameters_mm.len();
    let cols = (n as f32).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    let pitch = 30.0 * PX_PER_MM;
    let margin = 20.0 * PX_PER_MM;
    let w = (2.0 * margin + pitch * (cols - 1) as f32) as u32;
    let h = (2.0 * margin + pitch * (rows - 1) as f32) as u32;
    let pellet_r = 3.0 * PX_PER_MM;

    let mut image = RgbImage::from_pixel(w, h, LAWN);
    let mut circles = Vec::with_capacity(n);
    for (i, &d) in zone_diameters_mm.iter().enumerate() {
        let cx = margin + pitch * (i % cols) as f32;
        let cy = margin + pitch * (i / cols) as f32;
        let center = (cx as i32, cy as i32);
        draw_filled_circle_mut(&mut image, center, (d / 2.0 * PX_PER_MM) as i32, CLEAR_AGAR);
        draw_filled_circle_mut(&mut image, center, pellet_r as i32, PELLET);
        circles.push(Circle::new(cx, cy, pellet_r));
    }
    (image, circles)
}

#[test]
fn calibration_dish_reads_25_mm_everywhere() {
    let (image, circles) = photograph(&[25.0; 9]);
    let meter = ZoneMeter::new(MeasureConfig::default()).unwrap();
    let ctx = meter
        .compute_measurement_context(&image, false, &circles)
        .unwrap();
    let disks = meter.estimate_all_diameters(&ctx).unwrap();
    assert_eq!(disks.len(), 9);
    for (i, disk) in disks.iter().enumerate() {
        let d = disk.diameter_mm.unwrap();
        assert!((d - 25.0).abs() <= 0.5, "pellet {i}: {d} mm");
    }
}

#[test]
fn monotonic_dish_keeps_its_order() {
    let expected: Vec<f32> = [24.0, 25.0]
        .into_iter()
        .chain((10..=23).rev().map(|d| d as f32))
        .collect();
    assert_eq!(expected.len(), 16);

    let (image, circles) = photograph(&expected);
    let meter = ZoneMeter::new(MeasureConfig::default()).unwrap();
    let ctx = meter
        .compute_measurement_context(&image, false, &circles)
        .unwrap();
    let measured: Vec<f32> = meter
        .estimate_all_diameters(&ctx)
        .unwrap()
        .iter()
        .map(|disk| disk.diameter_mm.unwrap().round())
        .collect();
    assert_eq!(measured, expected);
}

#[test]
fn circumscribed_agrees_on_round_zones() {
    let (image, circles) = photograph(&[14.0, 18.0, 26.0, 32.0]);
    let meter = ZoneMeter::new(MeasureConfig::default()).unwrap();
    let ctx = meter
        .compute_measurement_context(&image, false, &circles)
        .unwrap();
    for (i, expected) in [14.0f32, 18.0, 26.0, 32.0].into_iter().enumerate() {
        let inscribed = meter
            .estimate_diameter(&ctx, i, MeasureMode::Inscribed)
            .unwrap();
        let circumscribed = meter
            .estimate_diameter(&ctx, i, MeasureMode::Circumscribed)
            .unwrap();
        assert_eq!(circumscribed.outcome, ZoneOutcome::Measured);
        let di = inscribed.diameter_mm.unwrap();
        let dc = circumscribed.diameter_mm.unwrap();
        assert!((di - expected).abs() <= 0.5, "pellet {i} inscribed {di}");
        assert!((dc - expected).abs() <= 0.5, "pellet {i} circumscribed {dc}");
    }
}

#[test]
fn bare_pellets_show_no_inhibition() {
    let (image, circles) = photograph(&[0.0, 20.0, 0.0, 20.0]);
    let meter = ZoneMeter::new(MeasureConfig::default()).unwrap();
    let ctx = meter
        .compute_measurement_context(&image, false, &circles)
        .unwrap();
    for i in [0, 2] {
        let circumscribed = meter
            .estimate_diameter(&ctx, i, MeasureMode::Circumscribed)
            .unwrap();
        assert_eq!(circumscribed.outcome, ZoneOutcome::NoInhibition, "pellet {i}");
        assert_eq!(circumscribed.diameter_mm, Some(6.0));

        let inscribed = meter
            .estimate_diameter(&ctx, i, MeasureMode::Inscribed)
            .unwrap();
        assert_eq!(inscribed.outcome, ZoneOutcome::NoInhibition, "pellet {i}");
        assert_eq!(inscribed.diameter_mm, None);
    }
}

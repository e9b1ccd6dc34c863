#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

// --- Point ---

#[test]
fn point_new() {
    let p = Point::new(3.0, 4.0);
    assert_eq!(p.x, 3.0);
    assert_eq!(p.y, 4.0);
}

#[test]
fn point_equality() {
    let a = Point::new(1.0, 2.0);
    let b = Point::new(1.0, 2.0);
    assert_eq!(a, b);
}

// --- Camera defaults ---

#[test]
fn camera_default_pan_is_zero() {
    let cam = Camera::default();
    assert_eq!(cam.pan_x, 0.0);
    assert_eq!(cam.pan_y, 0.0);
}

#[test]
fn camera_default_zoom_is_one() {
    let cam = Camera::default();
    assert_eq!(cam.zoom, 1.0);
}

// --- screen_to_image ---

#[test]
fn screen_to_image_identity() {
    let cam = Camera::default();
    let image = cam.screen_to_image(Point::new(50.0, 75.0));
    assert!(point_approx_eq(image, Point::new(50.0, 75.0)));
}

#[test]
fn screen_to_image_with_zoom() {
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 4.0 };
    let image = cam.screen_to_image(Point::new(40.0, 80.0));
    assert!(approx_eq(image.x, 10.0));
    assert!(approx_eq(image.y, 20.0));
}

#[test]
fn screen_to_image_with_pan() {
    let cam = Camera { pan_x: 100.0, pan_y: 50.0, zoom: 1.0 };
    let image = cam.screen_to_image(Point::new(100.0, 50.0));
    assert!(point_approx_eq(image, Point::new(0.0, 0.0)));
}

#[test]
fn screen_to_image_with_pan_and_zoom() {
    let cam = Camera { pan_x: 20.0, pan_y: 10.0, zoom: 2.0 };
    // screen (60, 30) -> image (20, 10) because (60-20)/2 = 20, (30-10)/2 = 10
    let image = cam.screen_to_image(Point::new(60.0, 30.0));
    assert!(point_approx_eq(image, Point::new(20.0, 10.0)));
}

#[test]
fn screen_to_image_origin() {
    let cam = Camera { pan_x: 50.0, pan_y: 30.0, zoom: 2.0 };
    let image = cam.screen_to_image(Point::new(0.0, 0.0));
    assert!(approx_eq(image.x, -25.0));
    assert!(approx_eq(image.y, -15.0));
}

// --- image_to_screen ---

#[test]
fn image_to_screen_identity() {
    let cam = Camera::default();
    let screen = cam.image_to_screen(Point::new(50.0, 75.0));
    assert!(point_approx_eq(screen, Point::new(50.0, 75.0)));
}

#[test]
fn image_to_screen_with_zoom() {
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };
    let screen = cam.image_to_screen(Point::new(10.0, 20.0));
    assert!(approx_eq(screen.x, 20.0));
    assert!(approx_eq(screen.y, 40.0));
}

#[test]
fn image_to_screen_with_pan_and_zoom() {
    let cam = Camera { pan_x: 20.0, pan_y: 10.0, zoom: 3.0 };
    let screen = cam.image_to_screen(Point::new(5.0, 5.0));
    // 5*3 + 20 = 35, 5*3 + 10 = 25
    assert!(approx_eq(screen.x, 35.0));
    assert!(approx_eq(screen.y, 25.0));
}

// --- Round trips ---

#[test]
fn round_trip_with_pan_and_zoom() {
    let cam = Camera { pan_x: 50.0, pan_y: -30.0, zoom: 2.0 };
    let image = Point::new(100.0, 200.0);
    let screen = cam.image_to_screen(image);
    let back = cam.screen_to_image(screen);
    assert!(point_approx_eq(image, back));
}

#[test]
fn round_trip_fractional_zoom() {
    let cam = Camera { pan_x: 13.7, pan_y: -42.3, zoom: 0.75 };
    let image = Point::new(333.3, -999.9);
    let back = cam.screen_to_image(cam.image_to_screen(image));
    assert!(point_approx_eq(image, back));
}

#[test]
fn round_trip_screen_first() {
    let cam = Camera { pan_x: 10.0, pan_y: 20.0, zoom: 1.5 };
    let screen = Point::new(400.0, 300.0);
    let back = cam.image_to_screen(cam.screen_to_image(screen));
    assert!(point_approx_eq(screen, back));
}

// --- screen_dist_to_image ---

#[test]
fn screen_dist_to_image_identity_at_zoom_one() {
    let cam = Camera::default();
    assert!(approx_eq(cam.screen_dist_to_image(42.0), 42.0));
}

#[test]
fn screen_dist_to_image_with_zoom() {
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };
    assert!(approx_eq(cam.screen_dist_to_image(10.0), 5.0));
}

#[test]
fn screen_dist_to_image_ignores_pan() {
    let cam = Camera { pan_x: 999.0, pan_y: -999.0, zoom: 4.0 };
    assert!(approx_eq(cam.screen_dist_to_image(8.0), 2.0));
}

// --- pan_by ---

#[test]
fn pan_by_accumulates() {
    let mut cam = Camera::default();
    cam.pan_by(10.0, -5.0);
    cam.pan_by(3.0, 2.0);
    assert!(approx_eq(cam.pan_x, 13.0));
    assert!(approx_eq(cam.pan_y, -3.0));
}

#[test]
fn pan_by_leaves_zoom_alone() {
    let mut cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.5 };
    cam.pan_by(100.0, 100.0);
    assert_eq!(cam.zoom, 2.5);
}

// --- zoom_at ---

#[test]
fn zoom_at_applies_factor() {
    let mut cam = Camera::default();
    cam.zoom_at(Point::new(0.0, 0.0), 1.1);
    assert!(approx_eq(cam.zoom, 1.1));
}

#[test]
fn zoom_at_origin_cursor_keeps_pan() {
    let mut cam = Camera::default();
    cam.zoom_at(Point::new(0.0, 0.0), 2.0);
    assert!(approx_eq(cam.pan_x, 0.0));
    assert!(approx_eq(cam.pan_y, 0.0));
}

#[test]
fn zoom_at_keeps_cursor_point_fixed() {
    let mut cam = Camera { pan_x: 37.0, pan_y: -12.0, zoom: 1.3 };
    let cursor = Point::new(640.0, 360.0);
    let before = cam.screen_to_image(cursor);
    cam.zoom_at(cursor, 1.1);
    let after = cam.screen_to_image(cursor);
    assert!(point_approx_eq(before, after));
}

#[test]
fn zoom_at_keeps_cursor_fixed_when_zooming_out() {
    let mut cam = Camera { pan_x: -80.0, pan_y: 45.0, zoom: 2.0 };
    let cursor = Point::new(200.0, 150.0);
    let before = cam.screen_to_image(cursor);
    cam.zoom_at(cursor, 0.9);
    let after = cam.screen_to_image(cursor);
    assert!(point_approx_eq(before, after));
}

#[test]
fn zoom_at_clamps_to_max() {
    let mut cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 4.9 };
    cam.zoom_at(Point::new(100.0, 100.0), 1.1);
    assert_eq!(cam.zoom, 5.0);
}

#[test]
fn zoom_at_clamps_to_min() {
    let mut cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 0.11 };
    cam.zoom_at(Point::new(100.0, 100.0), 0.9);
    assert_eq!(cam.zoom, 0.1);
}

#[test]
fn zoom_at_limit_is_stable() {
    let mut cam = Camera { pan_x: 17.0, pan_y: 23.0, zoom: 5.0 };
    cam.zoom_at(Point::new(300.0, 200.0), 1.1);
    assert_eq!(cam.zoom, 5.0);
    assert!(approx_eq(cam.pan_x, 17.0));
    assert!(approx_eq(cam.pan_y, 23.0));
}

#[test]
fn zoom_sequence_stays_in_bounds() {
    let mut cam = Camera::default();
    for _ in 0..100 {
        cam.zoom_at(Point::new(50.0, 50.0), 1.1);
    }
    assert_eq!(cam.zoom, 5.0);
    for _ in 0..200 {
        cam.zoom_at(Point::new(50.0, 50.0), 0.9);
    }
    assert_eq!(cam.zoom, 0.1);
}

// --- visible_center ---

#[test]
fn visible_center_default_camera() {
    let cam = Camera::default();
    let c = cam.visible_center(800.0, 600.0);
    assert!(point_approx_eq(c, Point::new(400.0, 300.0)));
}

#[test]
fn visible_center_with_pan_and_zoom() {
    let cam = Camera { pan_x: -100.0, pan_y: 50.0, zoom: 2.0 };
    let c = cam.visible_center(800.0, 600.0);
    // (100/2 + 800/4, -50/2 + 600/4) = (250, 125)
    assert!(point_approx_eq(c, Point::new(250.0, 125.0)));
}

#[test]
fn visible_center_matches_screen_to_image_of_midpoint() {
    let cam = Camera { pan_x: 33.0, pan_y: -7.0, zoom: 1.7 };
    let c = cam.visible_center(1920.0, 1080.0);
    let mid = cam.screen_to_image(Point::new(960.0, 540.0));
    assert!(point_approx_eq(c, mid));
}

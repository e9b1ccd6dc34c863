//! View-fit math: turning a selection rect, a whole map, or the host's own
//! camera into the camera state observers should render with.

#[cfg(test)]
#[path = "fit_test.rs"]
mod fit_test;

use serde::{Deserialize, Serialize};

use crate::camera::{Camera, Point};
use crate::consts::{DEFAULT_LABEL_FONT_SIZE, FIT_IMAGE_PADDING};

/// Axis-aligned rectangle in map-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Normalized rect spanning two arbitrary corners of a drag.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

/// Viewport dimensions in CSS pixels. The host's own canvas size doubles
/// as the stand-in for observer windows when computing fits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The camera state every observer renders with, as persisted per map and
/// broadcast on `view:update`.
///
/// `label_font_size` rides along so name labels stay legible at whatever
/// zoom the host picked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverView {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub label_font_size: u32,
}

impl Default for ObserverView {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            label_font_size: DEFAULT_LABEL_FONT_SIZE,
        }
    }
}

impl ObserverView {
    #[must_use]
    pub fn from_camera(camera: Camera, label_font_size: u32) -> Self {
        Self {
            zoom: camera.zoom,
            pan_x: camera.pan_x,
            pan_y: camera.pan_y,
            label_font_size,
        }
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        Camera {
            pan_x: self.pan_x,
            pan_y: self.pan_y,
            zoom: self.zoom,
        }
    }
}

/// Largest zoom that shows all of `rect`, centered in `viewport`.
///
/// The zoom is the limiting axis ratio and is deliberately not clamped to
/// the interactive camera range: a tiny selection is allowed to push
/// observers past the wheel-zoom ceiling. Returns `None` for degenerate
/// rects or viewports.
#[must_use]
pub fn fit_rect(rect: Rect, viewport: Viewport) -> Option<Camera> {
    if rect.width <= 0.0 || rect.height <= 0.0 || viewport.width <= 0.0 || viewport.height <= 0.0 {
        return None;
    }
    let zoom = (viewport.width / rect.width).min(viewport.height / rect.height);
    let center = rect.center();
    Some(Camera {
        pan_x: viewport.width / 2.0 - center.x * zoom,
        pan_y: viewport.height / 2.0 - center.y * zoom,
        zoom,
    })
}

/// Camera showing the whole map centered in `viewport` with a 10% margin,
/// never enlarged past natural size. Returns `None` for degenerate inputs.
#[must_use]
pub fn fit_image(image_w: f64, image_h: f64, viewport: Viewport) -> Option<Camera> {
    if image_w <= 0.0 || image_h <= 0.0 || viewport.width <= 0.0 || viewport.height <= 0.0 {
        return None;
    }
    let zoom_x = (viewport.width * FIT_IMAGE_PADDING) / image_w;
    let zoom_y = (viewport.height * FIT_IMAGE_PADDING) / image_h;
    let zoom = zoom_x.min(zoom_y).min(1.0);
    Some(Camera {
        pan_x: viewport.width / 2.0 - (image_w / 2.0) * zoom,
        pan_y: viewport.height / 2.0 - (image_h / 2.0) * zoom,
        zoom,
    })
}

/// Camera centering observers on what the host is currently looking at,
/// reusing the host's zoom. The host's visible center is clamped into the
/// map bounds first so observers are never parked on empty space.
#[must_use]
pub fn sync_from_host(host: Camera, viewport: Viewport, image_w: f64, image_h: f64) -> Camera {
    let center = host.visible_center(viewport.width, viewport.height);
    let cx = center.x.clamp(0.0, image_w.max(0.0));
    let cy = center.y.clamp(0.0, image_h.max(0.0));
    Camera {
        pan_x: viewport.width / 2.0 - cx * host.zoom,
        pan_y: viewport.height / 2.0 - cy * host.zoom,
        zoom: host.zoom,
    }
}

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::consts::{ZOOM_MAX, ZOOM_MIN};

/// A point in either screen or map-image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera state for pan/zoom over a map background.
///
/// `pan_x` / `pan_y` are the screen position of the map origin, in CSS
/// pixels. `zoom` is a scale factor (1.0 = natural size) and is kept
/// inside `[ZOOM_MIN, ZOOM_MAX]` by [`Camera::zoom_at`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Convert a screen-space point (CSS pixels) to map-image coordinates.
    #[must_use]
    pub fn screen_to_image(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.pan_x) / self.zoom,
            y: (screen.y - self.pan_y) / self.zoom,
        }
    }

    /// Convert a map-image point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn image_to_screen(&self, image: Point) -> Point {
        Point {
            x: image.x * self.zoom + self.pan_x,
            y: image.y * self.zoom + self.pan_y,
        }
    }

    /// Convert a screen-space distance (pixels) to map-image distance.
    #[must_use]
    pub fn screen_dist_to_image(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Translate the camera by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Scale zoom by `factor`, keeping the map point under `cursor` fixed
    /// on screen. The resulting zoom is clamped to `[ZOOM_MIN, ZOOM_MAX]`;
    /// the pan correction uses the clamped value, so repeated zooming at
    /// the limit leaves the camera untouched.
    pub fn zoom_at(&mut self, cursor: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(ZOOM_MIN, ZOOM_MAX);
        let ratio = new_zoom / self.zoom;
        self.pan_x = cursor.x - (cursor.x - self.pan_x) * ratio;
        self.pan_y = cursor.y - (cursor.y - self.pan_y) * ratio;
        self.zoom = new_zoom;
    }

    /// Map-image point currently at the center of a `viewport_w` by
    /// `viewport_h` viewport.
    #[must_use]
    pub fn visible_center(&self, viewport_w: f64, viewport_h: f64) -> Point {
        Point {
            x: (-self.pan_x / self.zoom) + viewport_w / (2.0 * self.zoom),
            y: (-self.pan_y / self.zoom) + viewport_h / (2.0 * self.zoom),
        }
    }
}

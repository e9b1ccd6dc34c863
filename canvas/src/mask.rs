//! In-memory fog mask and the brush/rect editor.
//!
//! The mask is an RGBA raster aligned 1:1 with the map background's natural
//! pixels. Fogged areas are opaque black, revealed areas are fully
//! transparent, and every edit writes one of those two pixel values; there is
//! no partial coverage. Renderers composite the raster over the background,
//! so observers simply cannot see what the host has not revealed.

#[cfg(test)]
#[path = "mask_test.rs"]
mod mask_test;

use std::str::FromStr;

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::camera::Point;
use crate::consts::MIN_FILL_RECT_DIM;
use crate::fit::Rect;

/// Pixel value for fogged (hidden) areas.
pub const HIDDEN_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Pixel value for revealed areas.
pub const REVEALED_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Whether an edit adds fog or removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Hide,
    Reveal,
}

impl Tool {
    #[must_use]
    pub fn pixel(self) -> Rgba<u8> {
        match self {
            Tool::Hide => HIDDEN_PIXEL,
            Tool::Reveal => REVEALED_PIXEL,
        }
    }
}

/// What a freshly initialized mask is filled with, before the host paints
/// anything. Configured per deployment; some tables want new maps fully
/// fogged, others fully open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FogPolicy {
    #[default]
    Hidden,
    Revealed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown fog policy (expected \"hidden\" or \"revealed\")")]
pub struct FogPolicyParseError;

impl FromStr for FogPolicy {
    type Err = FogPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(FogPolicy::Hidden),
            "revealed" => Ok(FogPolicy::Revealed),
            _ => Err(FogPolicyParseError),
        }
    }
}

impl FogPolicy {
    #[must_use]
    pub fn pixel(self) -> Rgba<u8> {
        match self {
            FogPolicy::Hidden => HIDDEN_PIXEL,
            FogPolicy::Revealed => REVEALED_PIXEL,
        }
    }
}

/// The editable fog raster for one map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskCanvas {
    image: RgbaImage,
}

impl MaskCanvas {
    #[must_use]
    pub fn new(width: u32, height: u32, policy: FogPolicy) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, policy.pixel()),
        }
    }

    /// Wrap an already decoded raster, e.g. a mask loaded from storage.
    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn is_hidden(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y).0[3] == 255
    }

    #[must_use]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y).0[3]
    }

    /// Match the mask to a new background size, resetting content per
    /// `policy`. A same-size call is a no-op so existing edits survive.
    /// Returns whether the raster was reinitialized.
    pub fn resize(&mut self, width: u32, height: u32, policy: FogPolicy) -> bool {
        if self.image.width() == width && self.image.height() == height {
            return false;
        }
        self.image = RgbaImage::from_pixel(width, height, policy.pixel());
        true
    }

    /// Stamp a polyline stroke with round caps and joins, `brush_width`
    /// pixels wide. Strokes with fewer than two points carry no segment and
    /// are ignored. Returns whether the stroke was applied.
    pub fn paint_stroke(&mut self, path: &[Point], tool: Tool, brush_width: f64) -> bool {
        if path.len() < 2 || brush_width <= 0.0 {
            tracing::debug!(points = path.len(), brush_width, "ignoring degenerate stroke");
            return false;
        }
        let radius = brush_width / 2.0;
        let fill = tool.pixel();
        for seg in path.windows(2) {
            self.stamp_segment(seg[0], seg[1], radius, fill);
        }
        true
    }

    /// Paint every pixel whose center lies within `radius` of the segment.
    /// Clamped projection onto the segment gives the round caps, and
    /// overlapping stamps at shared endpoints give the round joins.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn stamp_segment(&mut self, a: Point, b: Point, radius: f64, fill: Rgba<u8>) {
        let w = i64::from(self.image.width());
        let h = i64::from(self.image.height());
        let x0 = ((a.x.min(b.x) - radius).floor() as i64).max(0);
        let y0 = ((a.y.min(b.y) - radius).floor() as i64).max(0);
        let x1 = ((a.x.max(b.x) + radius).ceil() as i64).min(w - 1);
        let y1 = ((a.y.max(b.y) + radius).ceil() as i64).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if dist_to_segment(center, a, b) <= radius {
                    self.image.put_pixel(x as u32, y as u32, fill);
                }
            }
        }
    }

    /// Fill an axis-aligned rect. Rects under the minimum dimension are
    /// accidental drags and are ignored. Returns whether the fill was
    /// applied.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn fill_rect(&mut self, rect: Rect, tool: Tool) -> bool {
        if rect.width < MIN_FILL_RECT_DIM || rect.height < MIN_FILL_RECT_DIM {
            tracing::debug!(width = rect.width, height = rect.height, "ignoring undersized fill rect");
            return false;
        }
        let fill = tool.pixel();
        let w = i64::from(self.image.width());
        let h = i64::from(self.image.height());
        let x0 = ((rect.x - 0.5).ceil() as i64).max(0);
        let y0 = ((rect.y - 0.5).ceil() as i64).max(0);
        let x1 = ((rect.x + rect.width - 0.5).floor() as i64).min(w - 1);
        let y1 = ((rect.y + rect.height - 0.5).floor() as i64).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.image.put_pixel(x as u32, y as u32, fill);
            }
        }
        true
    }

    /// Fill the whole mask, first snapping its size back to the
    /// background's natural dimensions. Unlike the partial edits this
    /// always succeeds regardless of how the mask had drifted.
    pub fn fill_all(&mut self, tool: Tool, width: u32, height: u32) {
        let fill = tool.pixel();
        if self.image.width() == width && self.image.height() == height {
            for pixel in self.image.pixels_mut() {
                *pixel = fill;
            }
        } else {
            self.image = RgbaImage::from_pixel(width, height, fill);
        }
    }
}

/// Distance from `p` to the closest point on segment `ab`.
fn dist_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.x + t * abx;
    let cy = a.y + t * aby;
    let dx = p.x - cx;
    let dy = p.y - cy;
    (dx * dx + dy * dy).sqrt()
}

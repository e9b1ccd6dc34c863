//! Shared numeric constants for the canvas crate.

// ── Camera ──────────────────────────────────────────────────────

/// Lowest zoom the interactive camera will reach (10%).
pub const ZOOM_MIN: f64 = 0.1;

/// Highest zoom the interactive camera will reach (500%).
pub const ZOOM_MAX: f64 = 5.0;

/// Multiplicative zoom step for one wheel notch towards the map.
pub const ZOOM_STEP_IN: f64 = 1.1;

/// Multiplicative zoom step for one wheel notch away from the map.
pub const ZOOM_STEP_OUT: f64 = 0.9;

// ── View fit ────────────────────────────────────────────────────

/// Fraction of the viewport the whole-map fit fills, leaving a margin.
pub const FIT_IMAGE_PADDING: f64 = 0.9;

/// Label font size (px) a fresh observer view starts with.
pub const DEFAULT_LABEL_FONT_SIZE: u32 = 14;

// ── Mask editing ────────────────────────────────────────────────

/// Stroke width in image pixels for the fog brush.
pub const DEFAULT_BRUSH_WIDTH: f64 = 50.0;

/// Rect fills narrower or shorter than this are treated as accidental
/// clicks and ignored.
pub const MIN_FILL_RECT_DIM: f64 = 5.0;

// ── Mask codec ──────────────────────────────────────────────────

/// Encoded size (data-URI characters) above which the codec moves to the
/// next compression rung.
pub const MASK_SOFT_CAP: usize = 5 * 1024 * 1024;

/// Encoded size above which the final rung is rejected outright and the
/// previously persisted mask stays authoritative.
pub const MASK_HARD_CAP: usize = 10 * 1024 * 1024;

/// JPEG quality for the first lossy rung (canvas quality 0.7).
pub const JPEG_QUALITY_FIRST: u8 = 70;

/// JPEG quality for the second lossy rung and the half-res rung (0.5).
pub const JPEG_QUALITY_SECOND: u8 = 50;

/// Linear scale applied to each axis on the half-resolution rung.
pub const DOWNSAMPLE_SCALE: u32 = 2;

//! Input model: host tools, mouse buttons, and the gesture state machine.
//!
//! `HostTool` captures what the host intends a drag to do. `InputState` is
//! the active gesture being tracked between pointer-down and pointer-up,
//! carrying the context needed to preview the edit and commit it once on
//! release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::mask;

/// Which tool the host has active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostTool {
    /// Drag to pan the host's own camera (default).
    #[default]
    Pan,
    /// Paint fog along a free-hand stroke.
    HideBrush,
    /// Erase fog along a free-hand stroke.
    RevealBrush,
    /// Fog a dragged rectangle.
    HideRect,
    /// Reveal a dragged rectangle.
    RevealRect,
    /// Drag the rectangle observer cameras are fitted to.
    ViewRect,
}

impl HostTool {
    /// The mask edit this tool performs, if it edits the mask at all.
    #[must_use]
    pub fn mask_tool(self) -> Option<mask::Tool> {
        match self {
            Self::HideBrush | Self::HideRect => Some(mask::Tool::Hide),
            Self::RevealBrush | Self::RevealRect => Some(mask::Tool::Reveal),
            Self::Pan | Self::ViewRect => None,
        }
    }

    /// Whether this tool paints free-hand strokes.
    #[must_use]
    pub fn is_brush(self) -> bool {
        matches!(self, Self::HideBrush | Self::RevealBrush)
    }

    /// Whether this tool drags out a rectangle.
    #[must_use]
    pub fn is_rect(self) -> bool {
        matches!(self, Self::HideRect | Self::RevealRect | Self::ViewRect)
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Internal state for the input state machine.
///
/// Each active variant carries the gesture context needed to preview the
/// edit during the drag and emit the final action on pointer-up.
#[derive(Debug, Clone)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    Idle,
    /// The host is panning their own camera.
    Panning {
        /// Screen-space position of the previous pointer event, used to compute the pan delta.
        last_screen: Point,
    },
    /// The host is painting one brush stroke.
    Stroking {
        /// The mask edit being painted.
        tool: mask::Tool,
        /// Image-space points accumulated since pointer-down.
        path: Vec<Point>,
    },
    /// The host is dragging out a fog or reveal rectangle.
    DraggingMaskRect {
        /// The mask edit to apply on release.
        tool: mask::Tool,
        /// Image-space corner where the drag started.
        anchor: Point,
        /// Image-space position of the latest pointer event.
        cursor: Point,
    },
    /// The host is dragging the rectangle observers will be fitted to.
    DraggingViewRect {
        /// Image-space corner where the drag started.
        anchor: Point,
        /// Image-space position of the latest pointer event.
        cursor: Point,
    },
}

impl Default for InputState {
    fn default() -> Self {
        Self::Idle
    }
}

use crate::camera::{Camera, Point};
use crate::codec::{self, EncodedMask};
use crate::consts::{DEFAULT_BRUSH_WIDTH, ZOOM_STEP_IN, ZOOM_STEP_OUT};
use crate::fit::{self, ObserverView, Rect, Viewport};
use crate::input::{Button, HostTool, InputState, WheelDelta};
use crate::mask::{FogPolicy, MaskCanvas, Tool};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the caller to process.
///
/// The engine itself never touches the network or a database; a commit
/// action is the caller's cue to persist and broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Local scene changed; redraw.
    RenderNeeded,
    /// A finished gesture changed the mask; persist and fan out this
    /// encoding. At most one of these per pointer-down/up gesture.
    CommitMask(EncodedMask),
    /// The observer view changed; persist and fan it out.
    CommitView(ObserverView),
}

/// Host-side engine state: the hot editable mask, the host's own camera,
/// and the gesture state machine. Observers run a
/// [`crate::cache::RenderCache`] instead and never instantiate this.
pub struct HostEngine {
    pub camera: Camera,
    pub mask: MaskCanvas,
    pub input: InputState,
    pub tool: HostTool,
    pub brush_width: f64,
    pub viewport: Viewport,
    pub observer_view: ObserverView,
    pub policy: FogPolicy,
    pub background_w: u32,
    pub background_h: u32,
}

impl HostEngine {
    #[must_use]
    pub fn new(background_w: u32, background_h: u32, viewport: Viewport, policy: FogPolicy) -> Self {
        Self {
            camera: Camera::default(),
            mask: MaskCanvas::new(background_w, background_h, policy),
            input: InputState::default(),
            tool: HostTool::default(),
            brush_width: DEFAULT_BRUSH_WIDTH,
            viewport,
            observer_view: ObserverView::default(),
            policy,
            background_w,
            background_h,
        }
    }

    // --- Data inputs ---

    /// Swap in a new background (map switch or re-upload). A changed size
    /// reinitializes the mask per policy; a same-size background keeps it.
    pub fn set_background(&mut self, width: u32, height: u32) {
        self.background_w = width;
        self.background_h = height;
        self.mask.resize(width, height, self.policy);
    }

    /// Replace the mask with one decoded from storage, e.g. when taking
    /// over hosting an existing map.
    ///
    /// # Errors
    ///
    /// Propagates the decode failure; the current mask stays in place.
    pub fn load_mask(&mut self, data_uri: &str) -> Result<(), codec::CodecError> {
        let image = codec::decode(data_uri)?;
        self.mask = MaskCanvas::from_image(image);
        Ok(())
    }

    /// Adopt a previously persisted observer view, e.g. on map switch.
    pub fn load_observer_view(&mut self, view: ObserverView) {
        self.observer_view = view;
    }

    // --- Tool / viewport ---

    /// Set the active tool.
    pub fn set_tool(&mut self, tool: HostTool) {
        self.tool = tool;
    }

    /// Update the host canvas dimensions. These also stand in for observer
    /// windows when computing view fits.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button) -> Vec<Action> {
        if !matches!(self.input, InputState::Idle) {
            return Vec::new();
        }
        // Middle-drag pans no matter which tool is active.
        if button == Button::Middle {
            self.input = InputState::Panning { last_screen: screen_pt };
            return Vec::new();
        }
        if button != Button::Primary {
            return Vec::new();
        }
        let image_pt = self.camera.screen_to_image(screen_pt);
        match self.tool {
            HostTool::Pan => {
                self.input = InputState::Panning { last_screen: screen_pt };
                Vec::new()
            }
            tool @ (HostTool::HideBrush | HostTool::RevealBrush) => {
                let Some(tool) = tool.mask_tool() else {
                    return Vec::new();
                };
                self.input = InputState::Stroking { tool, path: vec![image_pt] };
                vec![Action::RenderNeeded]
            }
            tool @ (HostTool::HideRect | HostTool::RevealRect) => {
                let Some(tool) = tool.mask_tool() else {
                    return Vec::new();
                };
                self.input = InputState::DraggingMaskRect {
                    tool,
                    anchor: image_pt,
                    cursor: image_pt,
                };
                vec![Action::RenderNeeded]
            }
            HostTool::ViewRect => {
                self.input = InputState::DraggingViewRect {
                    anchor: image_pt,
                    cursor: image_pt,
                };
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        let image_pt = self.camera.screen_to_image(screen_pt);
        match &mut self.input {
            InputState::Idle => Vec::new(),
            InputState::Panning { last_screen } => {
                let dx = screen_pt.x - last_screen.x;
                let dy = screen_pt.y - last_screen.y;
                *last_screen = screen_pt;
                self.camera.pan_by(dx, dy);
                vec![Action::RenderNeeded]
            }
            InputState::Stroking { path, .. } => {
                path.push(image_pt);
                vec![Action::RenderNeeded]
            }
            InputState::DraggingMaskRect { cursor, .. }
            | InputState::DraggingViewRect { cursor, .. } => {
                *cursor = image_pt;
                vec![Action::RenderNeeded]
            }
        }
    }

    /// Finish the active gesture. Mask edits are committed here, exactly
    /// once per gesture, never per intermediate move.
    pub fn on_pointer_up(&mut self, screen_pt: Point) -> Vec<Action> {
        let image_pt = self.camera.screen_to_image(screen_pt);
        match std::mem::take(&mut self.input) {
            InputState::Idle => Vec::new(),
            InputState::Panning { .. } => Vec::new(),
            InputState::Stroking { tool, path } => {
                self.mask
                    .resize(self.background_w, self.background_h, self.policy);
                if self.mask.paint_stroke(&path, tool, self.brush_width) {
                    self.commit_mask()
                } else {
                    vec![Action::RenderNeeded]
                }
            }
            InputState::DraggingMaskRect { tool, anchor, .. } => {
                self.mask
                    .resize(self.background_w, self.background_h, self.policy);
                let rect = Rect::from_corners(anchor, image_pt);
                if self.mask.fill_rect(rect, tool) {
                    self.commit_mask()
                } else {
                    vec![Action::RenderNeeded]
                }
            }
            InputState::DraggingViewRect { anchor, .. } => {
                let rect = Rect::from_corners(anchor, image_pt);
                match fit::fit_rect(rect, self.viewport) {
                    Some(camera) => self.commit_view(camera),
                    None => vec![Action::RenderNeeded],
                }
            }
        }
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta) -> Vec<Action> {
        let factor = if delta.dy > 0.0 { ZOOM_STEP_OUT } else { ZOOM_STEP_IN };
        self.camera.zoom_at(screen_pt, factor);
        vec![Action::RenderNeeded]
    }

    // --- Whole-map operations ---

    /// Fog or reveal the entire map in one commit, snapping the mask back
    /// to the background's natural size first.
    pub fn fill_all(&mut self, tool: Tool) -> Vec<Action> {
        self.mask.fill_all(tool, self.background_w, self.background_h);
        self.commit_mask()
    }

    /// Point observers at the whole map with a comfortable margin.
    pub fn reset_observer_view(&mut self) -> Vec<Action> {
        let fitted = fit::fit_image(
            f64::from(self.background_w),
            f64::from(self.background_h),
            self.viewport,
        );
        match fitted {
            Some(camera) => self.commit_view(camera),
            None => Vec::new(),
        }
    }

    /// Center observers on whatever the host is looking at right now,
    /// zoom included.
    pub fn sync_observer_view(&mut self) -> Vec<Action> {
        let camera = fit::sync_from_host(
            self.camera,
            self.viewport,
            f64::from(self.background_w),
            f64::from(self.background_h),
        );
        self.commit_view(camera)
    }

    /// Change the label font size observers render names with.
    pub fn set_label_font_size(&mut self, size: u32) -> Vec<Action> {
        self.observer_view.label_font_size = size;
        vec![Action::CommitView(self.observer_view)]
    }

    // --- Internal ---

    /// Encode the mask and emit the commit. An encode that still busts the
    /// hard cap is logged and dropped; the previously persisted mask stays
    /// authoritative and the local hot mask keeps the edit.
    fn commit_mask(&mut self) -> Vec<Action> {
        match codec::encode(self.mask.image()) {
            Ok(encoded) => vec![Action::RenderNeeded, Action::CommitMask(encoded)],
            Err(err) => {
                tracing::warn!(error = %err, "mask commit abandoned");
                vec![Action::RenderNeeded]
            }
        }
    }

    fn commit_view(&mut self, camera: Camera) -> Vec<Action> {
        self.observer_view = ObserverView::from_camera(camera, self.observer_view.label_font_size);
        vec![Action::RenderNeeded, Action::CommitView(self.observer_view)]
    }
}

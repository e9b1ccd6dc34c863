#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;
use crate::codec::MaskFormat;
use crate::input::{Button, HostTool, InputState, WheelDelta};

// =============================================================
// Helpers
// =============================================================

fn engine() -> HostEngine {
    HostEngine::new(800, 600, Viewport::new(800.0, 600.0), FogPolicy::Revealed)
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn wheel(dy: f64) -> WheelDelta {
    WheelDelta { dx: 0.0, dy }
}

fn has_render(actions: &[Action]) -> bool {
    actions.iter().any(|a| matches!(a, Action::RenderNeeded))
}

fn committed_mask(actions: &[Action]) -> Option<&EncodedMask> {
    actions.iter().find_map(|a| match a {
        Action::CommitMask(m) => Some(m),
        _ => None,
    })
}

fn committed_view(actions: &[Action]) -> Option<ObserverView> {
    actions.iter().find_map(|a| match a {
        Action::CommitView(v) => Some(*v),
        _ => None,
    })
}

fn count_hidden(mask: &MaskCanvas) -> usize {
    mask.image().pixels().filter(|p| p.0[3] == 255).count()
}

/// Run a full down/move.../up gesture, returning all actions in order.
fn drag(eng: &mut HostEngine, points: &[Point], button: Button) -> Vec<Action> {
    let mut actions = eng.on_pointer_down(points[0], button);
    for p in &points[1..] {
        actions.extend(eng.on_pointer_move(*p));
    }
    actions.extend(eng.on_pointer_up(*points.last().unwrap()));
    actions
}

// =============================================================
// Construction
// =============================================================

#[test]
fn new_engine_mask_matches_policy_and_background() {
    let eng = engine();
    assert_eq!(eng.mask.width(), 800);
    assert_eq!(eng.mask.height(), 600);
    assert_eq!(count_hidden(&eng.mask), 0);

    let fogged = HostEngine::new(64, 64, Viewport::new(640.0, 480.0), FogPolicy::Hidden);
    assert_eq!(count_hidden(&fogged.mask), 64 * 64);
}

#[test]
fn new_engine_starts_idle_with_pan_tool() {
    let eng = engine();
    assert_eq!(eng.tool, HostTool::Pan);
    assert!(matches!(eng.input, InputState::Idle));
    assert_eq!(eng.camera, Camera::default());
}

// =============================================================
// Panning
// =============================================================

#[test]
fn pan_drag_moves_camera_by_screen_delta() {
    let mut eng = engine();
    drag(&mut eng, &[pt(100.0, 100.0), pt(130.0, 80.0)], Button::Primary);
    assert_eq!(eng.camera.pan_x, 30.0);
    assert_eq!(eng.camera.pan_y, -20.0);
}

#[test]
fn pan_drag_commits_nothing() {
    let mut eng = engine();
    let actions = drag(&mut eng, &[pt(0.0, 0.0), pt(50.0, 50.0)], Button::Primary);
    assert!(committed_mask(&actions).is_none());
    assert!(committed_view(&actions).is_none());
}

#[test]
fn middle_button_pans_with_brush_tool_active() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideBrush);
    drag(&mut eng, &[pt(10.0, 10.0), pt(60.0, 10.0)], Button::Middle);
    assert_eq!(eng.camera.pan_x, 50.0);
    assert_eq!(count_hidden(&eng.mask), 0);
}

#[test]
fn secondary_button_starts_no_gesture() {
    let mut eng = engine();
    let actions = eng.on_pointer_down(pt(10.0, 10.0), Button::Secondary);
    assert!(actions.is_empty());
    assert!(matches!(eng.input, InputState::Idle));
}

#[test]
fn pointer_down_during_gesture_is_ignored() {
    let mut eng = engine();
    eng.on_pointer_down(pt(0.0, 0.0), Button::Primary);
    let actions = eng.on_pointer_down(pt(50.0, 50.0), Button::Primary);
    assert!(actions.is_empty());
}

// =============================================================
// Wheel zoom
// =============================================================

#[test]
fn wheel_up_zooms_in() {
    let mut eng = engine();
    eng.on_wheel(pt(400.0, 300.0), wheel(-120.0));
    assert!((eng.camera.zoom - 1.1).abs() < 1e-10);
}

#[test]
fn wheel_down_zooms_out() {
    let mut eng = engine();
    eng.on_wheel(pt(400.0, 300.0), wheel(120.0));
    assert!((eng.camera.zoom - 0.9).abs() < 1e-10);
}

#[test]
fn wheel_zoom_keeps_cursor_anchored() {
    let mut eng = engine();
    let cursor = pt(640.0, 360.0);
    let before = eng.camera.screen_to_image(cursor);
    eng.on_wheel(cursor, wheel(-120.0));
    let after = eng.camera.screen_to_image(cursor);
    assert!((before.x - after.x).abs() < 1e-10);
    assert!((before.y - after.y).abs() < 1e-10);
}

#[test]
fn wheel_zoom_requests_render_only() {
    let mut eng = engine();
    let actions = eng.on_wheel(pt(0.0, 0.0), wheel(-120.0));
    assert_eq!(actions, vec![Action::RenderNeeded]);
}

// =============================================================
// Brush strokes
// =============================================================

#[test]
fn brush_gesture_commits_exactly_one_mask() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideBrush);
    let actions = drag(
        &mut eng,
        &[pt(100.0, 100.0), pt(150.0, 150.0), pt(200.0, 200.0)],
        Button::Primary,
    );
    let commits = actions
        .iter()
        .filter(|a| matches!(a, Action::CommitMask(_)))
        .count();
    assert_eq!(commits, 1);
}

#[test]
fn brush_moves_request_render_without_committing() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideBrush);
    eng.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    let actions = eng.on_pointer_move(pt(120.0, 120.0));
    assert!(has_render(&actions));
    assert!(committed_mask(&actions).is_none());
}

#[test]
fn hide_stroke_fogs_painted_pixels() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideBrush);
    drag(&mut eng, &[pt(100.0, 100.0), pt(200.0, 200.0)], Button::Primary);
    assert!(eng.mask.is_hidden(150, 150));
    assert!(!eng.mask.is_hidden(700, 500));
}

#[test]
fn hide_then_reveal_restores_transparency() {
    let mut eng = HostEngine::new(
        4000,
        3000,
        Viewport::new(1920.0, 1080.0),
        FogPolicy::Revealed,
    );
    let path = [pt(100.0, 100.0), pt(200.0, 200.0)];

    eng.set_tool(HostTool::HideBrush);
    let actions = drag(&mut eng, &path, Button::Primary);
    assert!(committed_mask(&actions).is_some());
    assert!(count_hidden(&eng.mask) > 0);
    assert!(eng.mask.is_hidden(150, 150));

    eng.set_tool(HostTool::RevealBrush);
    let actions = drag(&mut eng, &path, Button::Primary);
    assert!(committed_mask(&actions).is_some());
    assert_eq!(count_hidden(&eng.mask), 0);
}

#[test]
fn stroke_coordinates_are_image_space_under_zoom() {
    let mut eng = engine();
    eng.camera = Camera { pan_x: -100.0, pan_y: -100.0, zoom: 2.0 };
    eng.set_tool(HostTool::HideBrush);
    // Screen (300, 300) -> image (200, 200).
    drag(&mut eng, &[pt(300.0, 300.0), pt(400.0, 300.0)], Button::Primary);
    assert!(eng.mask.is_hidden(200, 200));
    assert!(eng.mask.is_hidden(250, 200));
    assert!(!eng.mask.is_hidden(300, 300));
}

#[test]
fn click_without_drag_paints_nothing() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideBrush);
    eng.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    let actions = eng.on_pointer_up(pt(100.0, 100.0));
    assert!(committed_mask(&actions).is_none());
    assert_eq!(count_hidden(&eng.mask), 0);
}

#[test]
fn commit_carries_encoded_dimensions() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideBrush);
    let actions = drag(&mut eng, &[pt(10.0, 10.0), pt(50.0, 50.0)], Button::Primary);
    let encoded = committed_mask(&actions).unwrap();
    assert_eq!(encoded.format, MaskFormat::Png);
    assert_eq!(encoded.width, 800);
    assert_eq!(encoded.height, 600);
    assert!(encoded.data_uri.starts_with("data:image/png;base64,"));
}

// =============================================================
// Rect fills
// =============================================================

#[test]
fn hide_rect_gesture_fogs_area() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideRect);
    let actions = drag(&mut eng, &[pt(100.0, 100.0), pt(500.0, 400.0)], Button::Primary);
    assert!(committed_mask(&actions).is_some());
    assert_eq!(count_hidden(&eng.mask), 400 * 300);
}

#[test]
fn backwards_rect_drag_normalizes() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideRect);
    drag(&mut eng, &[pt(500.0, 400.0), pt(100.0, 100.0)], Button::Primary);
    assert_eq!(count_hidden(&eng.mask), 400 * 300);
    assert!(eng.mask.is_hidden(100, 100));
}

#[test]
fn tiny_rect_drag_is_ignored() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideRect);
    let actions = drag(&mut eng, &[pt(100.0, 100.0), pt(103.0, 140.0)], Button::Primary);
    assert!(committed_mask(&actions).is_none());
    assert_eq!(count_hidden(&eng.mask), 0);
}

#[test]
fn reveal_rect_clears_fogged_area() {
    let mut eng = HostEngine::new(800, 600, Viewport::new(800.0, 600.0), FogPolicy::Hidden);
    eng.set_tool(HostTool::RevealRect);
    drag(&mut eng, &[pt(0.0, 0.0), pt(800.0, 600.0)], Button::Primary);
    assert_eq!(count_hidden(&eng.mask), 0);
}

// =============================================================
// Whole-map fills
// =============================================================

#[test]
fn fill_all_hide_fogs_whole_map() {
    let mut eng = engine();
    let actions = eng.fill_all(Tool::Hide);
    assert!(committed_mask(&actions).is_some());
    assert_eq!(count_hidden(&eng.mask), 800 * 600);
}

#[test]
fn fill_all_resizes_drifted_mask() {
    let mut eng = engine();
    // Mask drifted to stale dimensions (e.g. decoded from a half-res rung).
    eng.mask = MaskCanvas::new(400, 300, FogPolicy::Revealed);
    eng.fill_all(Tool::Hide);
    assert_eq!(eng.mask.width(), 800);
    assert_eq!(eng.mask.height(), 600);
    assert_eq!(count_hidden(&eng.mask), 800 * 600);
}

#[test]
fn fill_all_reveal_after_hide_round_trips() {
    let mut eng = engine();
    eng.fill_all(Tool::Hide);
    let actions = eng.fill_all(Tool::Reveal);
    assert!(committed_mask(&actions).is_some());
    assert_eq!(count_hidden(&eng.mask), 0);
}

// =============================================================
// Background changes
// =============================================================

#[test]
fn background_resize_reinitializes_mask() {
    let mut eng = engine();
    eng.fill_all(Tool::Hide);
    eng.set_background(1024, 768);
    assert_eq!(eng.mask.width(), 1024);
    assert_eq!(count_hidden(&eng.mask), 0);
}

#[test]
fn same_background_keeps_mask_edits() {
    let mut eng = engine();
    eng.set_tool(HostTool::HideRect);
    drag(&mut eng, &[pt(0.0, 0.0), pt(100.0, 100.0)], Button::Primary);
    let before = count_hidden(&eng.mask);
    eng.set_background(800, 600);
    assert_eq!(count_hidden(&eng.mask), before);
}

#[test]
fn stroke_after_background_change_paints_at_new_size() {
    let mut eng = engine();
    eng.set_background(1000, 1000);
    eng.set_tool(HostTool::HideBrush);
    drag(&mut eng, &[pt(900.0, 900.0), pt(950.0, 950.0)], Button::Primary);
    assert!(eng.mask.is_hidden(925, 925));
}

// =============================================================
// Mask loading
// =============================================================

#[test]
fn load_mask_adopts_stored_raster() {
    let mut eng = engine();
    let mut stored = MaskCanvas::new(800, 600, FogPolicy::Hidden);
    stored.fill_rect(Rect::new(0.0, 0.0, 100.0, 100.0), Tool::Reveal);
    let encoded = codec::encode(stored.image()).unwrap();

    eng.load_mask(&encoded.data_uri).unwrap();
    assert_eq!(count_hidden(&eng.mask), 800 * 600 - 100 * 100);
}

#[test]
fn load_mask_failure_keeps_current_mask() {
    let mut eng = engine();
    eng.fill_all(Tool::Hide);
    assert!(eng.load_mask("data:image/png;base64,@@@").is_err());
    assert_eq!(count_hidden(&eng.mask), 800 * 600);
}

// =============================================================
// Observer view
// =============================================================

#[test]
fn view_rect_gesture_commits_fitted_view() {
    let mut eng = engine();
    eng.set_viewport(1920.0, 1080.0);
    eng.set_tool(HostTool::ViewRect);
    let actions = drag(&mut eng, &[pt(100.0, 100.0), pt(500.0, 400.0)], Button::Primary);
    let view = committed_view(&actions).unwrap();
    assert!((view.zoom - 3.6).abs() < 1e-10);
    assert!((view.pan_x - -120.0).abs() < 1e-10);
    assert!((view.pan_y - -360.0).abs() < 1e-10);
    assert_eq!(eng.observer_view, view);
}

#[test]
fn view_rect_gesture_converts_screen_to_image() {
    let mut eng = engine();
    eng.set_viewport(1920.0, 1080.0);
    eng.camera = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };
    eng.set_tool(HostTool::ViewRect);
    // Screen corners (200,200)-(1000,800) -> image rect (100,100)-(500,400).
    let actions = drag(&mut eng, &[pt(200.0, 200.0), pt(1000.0, 800.0)], Button::Primary);
    let view = committed_view(&actions).unwrap();
    assert!((view.zoom - 3.6).abs() < 1e-10);
}

#[test]
fn degenerate_view_rect_commits_nothing() {
    let mut eng = engine();
    eng.set_tool(HostTool::ViewRect);
    eng.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    let actions = eng.on_pointer_up(pt(100.0, 100.0));
    assert!(committed_view(&actions).is_none());
}

#[test]
fn reset_observer_view_fits_whole_map() {
    let mut eng = engine();
    let actions = eng.reset_observer_view();
    let view = committed_view(&actions).unwrap();
    // 800x600 map in a 800x600 viewport with 10% padding.
    assert!((view.zoom - 0.9).abs() < 1e-10);
    assert!((view.pan_x - 40.0).abs() < 1e-10);
    assert!((view.pan_y - 30.0).abs() < 1e-10);
}

#[test]
fn sync_observer_view_copies_host_center_and_zoom() {
    let mut eng = engine();
    eng.camera = Camera { pan_x: -200.0, pan_y: -100.0, zoom: 2.0 };
    let actions = eng.sync_observer_view();
    let view = committed_view(&actions).unwrap();
    assert_eq!(view.zoom, 2.0);
    // Host visible center is (300, 200), inside the 800x600 map.
    assert!((view.pan_x - (400.0 - 300.0 * 2.0)).abs() < 1e-10);
    assert!((view.pan_y - (300.0 - 200.0 * 2.0)).abs() < 1e-10);
}

#[test]
fn label_font_size_rides_along_view_commits() {
    let mut eng = engine();
    let actions = eng.set_label_font_size(22);
    assert_eq!(committed_view(&actions).unwrap().label_font_size, 22);

    let actions = eng.reset_observer_view();
    assert_eq!(committed_view(&actions).unwrap().label_font_size, 22);
}

#[test]
fn load_observer_view_restores_persisted_state() {
    let mut eng = engine();
    let stored = ObserverView { zoom: 2.5, pan_x: -40.0, pan_y: 12.0, label_font_size: 18 };
    eng.load_observer_view(stored);
    assert_eq!(eng.observer_view, stored);
}

//! Fog-of-war canvas engine for fogboard sessions.
//!
//! This crate owns everything that happens between a pointer event on the
//! host's map and the encoded mask or camera update that goes out over the
//! wire. It has no rendering backend and no network code of its own: callers
//! feed it input events and consume the resulting [`engine::Action`]s. The
//! server and CLI embed it directly; a GPU or terminal renderer only needs
//! the pixel buffers it exposes.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level host engine driving mask edits and view updates |
//! | [`mask`] | In-memory fog mask raster and the brush/rect editor |
//! | [`codec`] | Mask serialization ladder (PNG, JPEG, half-res JPEG) |
//! | [`cache`] | Observer-side decoded-mask cache with flicker-free swap |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`fit`] | View-fit math and the shared observer-view payload |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`consts`] | Shared numeric constants (zoom limits, size caps, etc.) |

pub mod cache;
pub mod camera;
pub mod codec;
pub mod consts;
pub mod engine;
pub mod fit;
pub mod input;
pub mod mask;

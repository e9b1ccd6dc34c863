//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and ticket plumbing.

pub mod adventure;
pub mod layer;
pub mod map;
pub mod session;

//! Observer-side decoded-mask cache.
//!
//! Observers never paint; they re-decode whatever mask the host last
//! committed. The displayed raster is swapped only after a successful
//! decode, so a corrupt or truncated update can never blank the fog and
//! leak the map, and an identical update never triggers a redundant
//! decode.

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;

use image::RgbaImage;
use uuid::Uuid;

use crate::codec;

/// A decoded mask the renderer is currently compositing.
#[derive(Debug, Clone)]
pub struct CachedMask {
    pub map_id: Uuid,
    pub data_uri: String,
    pub image: RgbaImage,
}

/// What [`RenderCache::apply`] did with an incoming mask update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Decoded and now displayed; the caller should redraw.
    Swapped,
    /// Same mask as already displayed; nothing to do.
    Unchanged,
    /// Decode failed; the previous mask stays up.
    Retained,
}

#[derive(Debug, Default)]
pub struct RenderCache {
    displayed: Option<CachedMask>,
}

impl RenderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn displayed(&self) -> Option<&CachedMask> {
        self.displayed.as_ref()
    }

    /// The active map has no mask; stop compositing fog entirely.
    pub fn clear(&mut self) {
        self.displayed = None;
    }

    /// Feed one mask update from the wire or a snapshot.
    pub fn apply(&mut self, map_id: Uuid, data_uri: &str) -> SwapOutcome {
        if let Some(current) = &self.displayed {
            if current.map_id == map_id && current.data_uri == data_uri {
                return SwapOutcome::Unchanged;
            }
        }
        match codec::decode(data_uri) {
            Ok(image) => {
                self.displayed = Some(CachedMask {
                    map_id,
                    data_uri: data_uri.to_string(),
                    image,
                });
                SwapOutcome::Swapped
            }
            Err(err) => {
                tracing::warn!(%map_id, error = %err, "mask decode failed, keeping previous mask");
                SwapOutcome::Retained
            }
        }
    }
}

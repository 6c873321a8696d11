//! Shared vocabulary for the newsroom core crates.
//!
//! Everything here is plain data: pixel geometry, the closed animation
//! enumerations, easing curves, id newtypes, and the display-geometry seam.
//! No crate below this one knows about the event loop, the network, or the
//! rendering surface.

pub mod anim;
pub mod easing;
pub mod geometry;

pub use anim::{AgeEffects, AnimEntryType, AnimExitType, FixedText};
pub use easing::EasingCurve;
pub use geometry::{Point, Rect, Size, Vector};

use serde::{Deserialize, Serialize};

/// Identifies one chyron within a desk. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChyronId(pub u64);

/// Identifies one headline within its owning chyron's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeadlineId(pub u64);

/// Identifies one producer (and its reporter wiring) within a desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId(pub u64);

/// Font request for headline text. The concrete rasterization lives behind
/// the surface; core code only carries the family name and point size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub point_size: f32,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, point_size: f32) -> Self {
        Self {
            family: family.into(),
            point_size,
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Sans".to_string(),
            point_size: 10.0,
        }
    }
}

/// Resolves a display index to the rectangle it covers.
///
/// Indexes out of range clamp to the primary display so a story configured
/// for a monitor that is no longer attached still lands somewhere visible.
pub trait DisplayGeometry {
    fn display_rect(&self, index: usize) -> Rect;
}

/// Fixed display set, used by the terminal surface and by every test.
#[derive(Debug, Clone)]
pub struct FixedDisplays {
    displays: Vec<Rect>,
}

impl FixedDisplays {
    pub fn new(displays: Vec<Rect>) -> Self {
        assert!(!displays.is_empty(), "at least one display is required");
        Self { displays }
    }

    pub fn single(rect: Rect) -> Self {
        Self::new(vec![rect])
    }
}

impl DisplayGeometry for FixedDisplays {
    fn display_rect(&self, index: usize) -> Rect {
        *self
            .displays
            .get(index)
            .unwrap_or_else(|| &self.displays[0])
    }
}

//! Abstraction over the single scroll container shared by the render
//! window (expansion triggers) and the scroll anchor (position writes).
//!
//! All heights and offsets are in abstract layout units; the presentation
//! layer decides what one unit is (the bundled TUI maps one text row to
//! [`ROW_UNITS`] units). Both consumers read metrics through this trait at
//! the moment they act, so a position written by one is never clobbered by
//! a decision computed against stale numbers.

/// Layout units per terminal row in the bundled TUI.
pub const ROW_UNITS: u32 = 8;

/// Snapshot of the scroll container geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    /// Offset of the viewport top from the content top
    pub scroll_top: u32,
    /// Total content height, including the spacer
    pub scroll_height: u32,
    /// Visible height of the container
    pub client_height: u32,
}

impl ScrollMetrics {
    /// Distance between the viewport bottom and the content bottom.
    pub fn bottom_gap(&self) -> u32 {
        self.scroll_height
            .saturating_sub(self.client_height)
            .saturating_sub(self.scroll_top)
    }

    /// Largest meaningful scroll offset.
    pub fn max_scroll_top(&self) -> u32 {
        self.scroll_height.saturating_sub(self.client_height)
    }
}

/// Live view of the scroll container.
pub trait Viewport {
    fn metrics(&self) -> ScrollMetrics;
    fn set_scroll_top(&mut self, top: u32);
}

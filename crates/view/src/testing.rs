//! Test doubles for the viewport abstraction.

use crate::viewport::{ScrollMetrics, Viewport};

/// In-memory scroll container. Content height is set by the test (or
/// recomputed by a caller-supplied closure between steps); scroll writes
/// are clamped the way a real container clamps them.
#[derive(Debug, Clone)]
pub struct FakeViewport {
    pub scroll_top: u32,
    pub scroll_height: u32,
    pub client_height: u32,
}

impl FakeViewport {
    pub fn new(scroll_top: u32, scroll_height: u32, client_height: u32) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// Simulate content growing by `delta` at the bottom.
    pub fn append_content(&mut self, delta: u32) {
        self.scroll_height += delta;
    }

    /// Simulate content of height `delta` inserted above the viewport.
    /// The container keeps `scroll_top` as-is; compensation is the
    /// anchor's job.
    pub fn prepend_content(&mut self, delta: u32) {
        self.scroll_height += delta;
    }
}

impl Viewport for FakeViewport {
    fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.scroll_top,
            scroll_height: self.scroll_height,
            client_height: self.client_height,
        }
    }

    fn set_scroll_top(&mut self, top: u32) {
        self.scroll_top = top.min(self.metrics().max_scroll_top());
    }
}

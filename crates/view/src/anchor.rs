//! Scroll anchoring: decides, for every content change, whether the
//! viewport stays pinned to the newest item or holds the viewer's reading
//! position, and compensates for content inserted above the viewport.
//!
//! All work is cooperative: anything that must happen "after layout" is a
//! pending op drained by [`ScrollAnchor::on_frame`], and pending ops are
//! cancelled on thread switch so stale callbacks never touch the scroll
//! position of a different conversation.

use crate::viewport::Viewport;
use tracing::debug;

/// Gap (layout units) between viewport bottom and content bottom beyond
/// which the viewer counts as "scrolled up" and auto-follow pauses.
pub const FOLLOW_THRESHOLD: u32 = 80;

/// Extra bottom re-pins after a content change, to catch sub-content that
/// renders a frame or two late (deferred markdown formatting and the
/// like).
const PIN_FRAMES_AFTER_CHANGE: u8 = 2;

/// Per-thread scroll anchor state machine.
#[derive(Debug)]
pub struct ScrollAnchor {
    user_scrolled_up: bool,
    follow_threshold: u32,
    thread_identity: Option<String>,
    /// Follow once on the next content change regardless of the flag;
    /// armed by a thread switch.
    force_follow_next: bool,
    pending_pin_frames: u8,
    /// Content height at the last observation, for prepend compensation.
    last_scroll_height: u32,
    last_fingerprint: Option<u64>,
}

impl Default for ScrollAnchor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollAnchor {
    pub fn new() -> Self {
        Self::with_follow_threshold(FOLLOW_THRESHOLD)
    }

    pub fn with_follow_threshold(follow_threshold: u32) -> Self {
        Self {
            user_scrolled_up: false,
            follow_threshold,
            thread_identity: None,
            force_follow_next: false,
            pending_pin_frames: 0,
            last_scroll_height: 0,
            last_fingerprint: None,
        }
    }

    pub fn is_user_scrolled_up(&self) -> bool {
        self.user_scrolled_up
    }

    /// Track which thread the viewport shows. Switching cancels pending
    /// deferred work and forces a pin-to-bottom on the first content
    /// change of the new thread.
    pub fn set_thread(&mut self, identity: &str) {
        if self.thread_identity.as_deref() == Some(identity) {
            return;
        }
        debug!(identity, "scroll anchor switched thread");
        self.thread_identity = Some(identity.to_string());
        self.force_follow_next = true;
        self.pending_pin_frames = 0;
        self.last_fingerprint = None;
        self.last_scroll_height = 0;
    }

    /// Feed a scroll observation (from a passive listener, at most one per
    /// frame). Updates the follow flag from the bottom gap.
    pub fn observe_scroll<V: Viewport>(&mut self, viewport: &V) {
        let metrics = viewport.metrics();
        let scrolled_up = metrics.bottom_gap() > self.follow_threshold;
        if scrolled_up != self.user_scrolled_up {
            debug!(scrolled_up, "follow state changed");
        }
        self.user_scrolled_up = scrolled_up;
        self.last_scroll_height = metrics.scroll_height;
    }

    /// The viewer did something that should snap the view to the newest
    /// content (sent a message, usually).
    pub fn force_follow(&mut self) {
        self.user_scrolled_up = false;
    }

    /// Content grew or changed. `fingerprint` identifies the content
    /// revision; repeated notifications for the same revision are ignored.
    /// When following, pins to bottom now and re-pins for the next couple
    /// of frames; when the viewer is scrolled up, holds position.
    pub fn notify_content_changed<V: Viewport>(&mut self, fingerprint: u64, viewport: &mut V) {
        if self.last_fingerprint == Some(fingerprint) {
            return;
        }
        self.last_fingerprint = Some(fingerprint);

        if self.force_follow_next {
            self.force_follow_next = false;
            self.user_scrolled_up = false;
        }
        if !self.user_scrolled_up {
            self.pin_to_bottom(viewport);
            self.pending_pin_frames = PIN_FRAMES_AFTER_CHANGE;
        } else {
            self.last_scroll_height = viewport.metrics().scroll_height;
        }
    }

    /// Older content was just mounted above the viewport. Shift the offset
    /// by the height delta so the visually-anchored item does not move.
    /// Must run before the next paint.
    pub fn notify_older_content_loaded<V: Viewport>(&mut self, viewport: &mut V) {
        let metrics = viewport.metrics();
        let delta = metrics.scroll_height.saturating_sub(self.last_scroll_height);
        if delta > 0 {
            debug!(delta, "compensating for prepended content");
            viewport.set_scroll_top(metrics.scroll_top.saturating_add(delta));
        }
        self.last_scroll_height = metrics.scroll_height;
    }

    /// Drain deferred work for this frame. Call once per paint.
    pub fn on_frame<V: Viewport>(&mut self, viewport: &mut V) {
        if self.pending_pin_frames > 0 {
            self.pending_pin_frames -= 1;
            if !self.user_scrolled_up {
                self.pin_to_bottom(viewport);
            }
        }
    }

    /// Explicit jump to the newest content; resumes following.
    pub fn jump_to_bottom<V: Viewport>(&mut self, viewport: &mut V) {
        self.user_scrolled_up = false;
        self.pin_to_bottom(viewport);
        self.pending_pin_frames = 1;
    }

    fn pin_to_bottom<V: Viewport>(&mut self, viewport: &mut V) {
        let metrics = viewport.metrics();
        viewport.set_scroll_top(metrics.max_scroll_top());
        self.last_scroll_height = metrics.scroll_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeViewport;

    #[test]
    fn large_bottom_gap_detaches_follow() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(500, 2000, 800);
        // First change of a fresh thread always follows.
        anchor.notify_content_changed(1, &mut viewport);
        assert_eq!(viewport.scroll_top, 1200);

        viewport.set_scroll_top(500);
        anchor.observe_scroll(&viewport);
        assert!(anchor.is_user_scrolled_up()); // gap 700 > 80

        viewport.append_content(400);
        anchor.notify_content_changed(2, &mut viewport);
        assert_eq!(viewport.scroll_top, 500); // held position
    }

    #[test]
    fn small_bottom_gap_keeps_following() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(1150, 2000, 800);
        anchor.observe_scroll(&viewport);
        assert!(!anchor.is_user_scrolled_up()); // gap 50 <= 80

        viewport.append_content(300);
        anchor.notify_content_changed(1, &mut viewport);
        assert_eq!(viewport.scroll_top, 2300 - 800); // pinned to new bottom
    }

    #[test]
    fn prepend_compensation_is_exact() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(500, 2000, 800);
        anchor.observe_scroll(&viewport);

        viewport.prepend_content(680); // five items of known height
        anchor.notify_older_content_loaded(&mut viewport);
        assert_eq!(viewport.scroll_top, 500 + 680);
    }

    #[test]
    fn prepend_compensation_saturates_on_huge_deltas() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(4_000_000_000, 4_200_000_000, 800);
        // No prior observation, so the whole height counts as freshly
        // prepended content and the raw sum would overflow u32.
        anchor.notify_older_content_loaded(&mut viewport);
        assert_eq!(viewport.scroll_top, viewport.metrics().max_scroll_top());
    }

    #[test]
    fn prepend_with_no_growth_is_a_noop() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(500, 2000, 800);
        anchor.observe_scroll(&viewport);
        anchor.notify_older_content_loaded(&mut viewport);
        assert_eq!(viewport.scroll_top, 500);
    }

    #[test]
    fn thread_switch_forces_follow_once() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(0, 2000, 800);
        anchor.observe_scroll(&viewport);
        assert!(anchor.is_user_scrolled_up());

        anchor.set_thread("t2");
        anchor.notify_content_changed(1, &mut viewport);
        assert_eq!(viewport.scroll_top, 1200);
        assert!(!anchor.is_user_scrolled_up());

        // Back to normal tracking afterwards.
        viewport.set_scroll_top(0);
        anchor.observe_scroll(&viewport);
        viewport.append_content(100);
        anchor.notify_content_changed(2, &mut viewport);
        assert_eq!(viewport.scroll_top, 0);
    }

    #[test]
    fn repeat_thread_switch_is_idempotent() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(1150, 2000, 800);
        anchor.notify_content_changed(1, &mut viewport);
        anchor.observe_scroll(&viewport);

        // Same identity again must not re-arm the forced follow.
        anchor.set_thread("t1");
        viewport.set_scroll_top(0);
        anchor.observe_scroll(&viewport);
        viewport.append_content(100);
        anchor.notify_content_changed(2, &mut viewport);
        assert_eq!(viewport.scroll_top, 0);
    }

    #[test]
    fn same_fingerprint_is_ignored() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(1150, 2000, 800);
        anchor.notify_content_changed(7, &mut viewport);
        let pinned = viewport.scroll_top;

        viewport.set_scroll_top(100);
        anchor.notify_content_changed(7, &mut viewport);
        assert_eq!(viewport.scroll_top, 100);
        assert_ne!(pinned, 100);
    }

    #[test]
    fn frame_repins_catch_late_content() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(1150, 2000, 800);
        anchor.notify_content_changed(1, &mut viewport);
        assert_eq!(viewport.scroll_top, 1200);

        // Markdown finished rendering a frame later and grew the content.
        viewport.append_content(500);
        anchor.on_frame(&mut viewport);
        assert_eq!(viewport.scroll_top, 1700);

        viewport.append_content(500);
        anchor.on_frame(&mut viewport);
        assert_eq!(viewport.scroll_top, 2200);

        // Budget exhausted: no further re-pins.
        viewport.append_content(500);
        anchor.on_frame(&mut viewport);
        assert_eq!(viewport.scroll_top, 2200);
    }

    #[test]
    fn thread_switch_cancels_pending_pins() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(1150, 2000, 800);
        anchor.notify_content_changed(1, &mut viewport);

        anchor.set_thread("t2");
        viewport.set_scroll_top(100);
        anchor.on_frame(&mut viewport);
        assert_eq!(viewport.scroll_top, 100); // stale pin was dropped
    }

    #[test]
    fn jump_to_bottom_reattaches() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(0, 2000, 800);
        anchor.observe_scroll(&viewport);
        assert!(anchor.is_user_scrolled_up());

        anchor.jump_to_bottom(&mut viewport);
        assert_eq!(viewport.scroll_top, 1200);
        assert!(!anchor.is_user_scrolled_up());
    }

    #[test]
    fn force_follow_clears_the_flag() {
        let mut anchor = ScrollAnchor::new();
        anchor.set_thread("t1");
        let mut viewport = FakeViewport::new(0, 2000, 800);
        anchor.observe_scroll(&viewport);
        assert!(anchor.is_user_scrolled_up());

        anchor.force_follow();
        viewport.append_content(100);
        anchor.notify_content_changed(1, &mut viewport);
        assert_eq!(viewport.scroll_top, viewport.metrics().max_scroll_top());
    }
}

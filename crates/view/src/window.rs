//! Suffix window over the built timeline.
//!
//! Materializing tens of thousands of items is prohibitively expensive, so
//! only the newest `render_count` items are handed to the presentation
//! layer. The hidden prefix is stood in for by a spacer whose height is a
//! per-type estimate; it only has to be close enough that mounting the
//! real items later causes no jump larger than the viewport.

use crate::viewport::Viewport;
use threadview_core::timeline::{RenderItem, ToolEntry};
use tracing::debug;

/// Items shown before the viewer ever scrolls up.
pub const INITIAL_RENDER_COUNT: usize = 30;
/// Items added per expansion step.
pub const EXPAND_STEP: usize = 20;
/// How close (in layout units) the viewport top may get to the
/// spacer/content boundary before the window expands.
pub const EXPAND_TRIGGER_GAP: u32 = 600;
/// Extra items revealed above a jump target so it doesn't sit at the very
/// edge of the window.
const EXPAND_TO_PADDING: usize = 5;
/// Cap on expand-retry rounds per settle pass.
const MAX_EXPAND_ROUNDS: usize = 8;

// Spacer height estimates per item type, in layout units. Tuned by eye;
// only the "no visible jump" property matters, not the exact values.
const EST_MESSAGE: u32 = 120;
const EST_TOOL_CALL: u32 = 56;
const EST_EVENT: u32 = 40;
const EST_COMPACTION: u32 = 48;
const ITEM_GAP: u32 = 16;

/// Estimated height of one render item, in layout units. Groups and runs
/// scale with their member count.
pub fn estimate_height(item: &RenderItem) -> u32 {
    match item {
        RenderItem::Message(_) => EST_MESSAGE,
        RenderItem::Call(_) => EST_TOOL_CALL,
        RenderItem::Group(group) => EST_TOOL_CALL * group.calls.len() as u32,
        RenderItem::Run(entries) => entries
            .iter()
            .map(|entry| match entry {
                ToolEntry::Call(_) => EST_TOOL_CALL,
                ToolEntry::Group(group) => EST_TOOL_CALL * group.calls.len() as u32,
            })
            .sum(),
        RenderItem::Event(_) => EST_EVENT,
        RenderItem::Compaction(_) => EST_COMPACTION,
    }
}

/// Progressive-disclosure window: always the suffix of the timeline,
/// growing toward older content on demand.
#[derive(Debug)]
pub struct RenderWindow {
    render_count: usize,
    initial_count: usize,
    thread_identity: Option<String>,
}

impl Default for RenderWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderWindow {
    pub fn new() -> Self {
        Self::with_initial_count(INITIAL_RENDER_COUNT)
    }

    pub fn with_initial_count(initial_count: usize) -> Self {
        Self {
            render_count: initial_count,
            initial_count,
            thread_identity: None,
        }
    }

    pub fn render_count(&self) -> usize {
        self.render_count
    }

    /// Track which thread is being shown; switching threads collapses the
    /// window back to its initial size. Calling with the identity already
    /// tracked is a no-op.
    pub fn reset(&mut self, identity: &str) {
        if self.thread_identity.as_deref() == Some(identity) {
            return;
        }
        debug!(identity, "render window reset");
        self.thread_identity = Some(identity.to_string());
        self.render_count = self.initial_count;
    }

    /// Number of items hidden behind the spacer.
    pub fn hidden_prefix_len(&self, items: &[RenderItem]) -> usize {
        items.len().saturating_sub(self.render_count)
    }

    /// The suffix of `items` currently handed to the presentation layer.
    pub fn visible_slice<'a>(&self, items: &'a [RenderItem]) -> &'a [RenderItem] {
        &items[self.hidden_prefix_len(items)..]
    }

    /// Estimated height of the hidden prefix, one inter-item gap per item.
    pub fn spacer_height(&self, items: &[RenderItem]) -> u32 {
        items[..self.hidden_prefix_len(items)]
            .iter()
            .map(|item| estimate_height(item) + ITEM_GAP)
            .sum()
    }

    /// Grow the window by `amount`, never past the full timeline.
    pub fn expand(&mut self, amount: usize, total_items: usize) {
        self.render_count = (self.render_count + amount).min(total_items);
    }

    /// Grow the window just enough that the item holding `target_id`
    /// becomes visible, with a little padding above it. Takes effect
    /// synchronously so a follow-up scroll-into-view sees the item
    /// mounted. An unknown id is a benign miss, not an error.
    pub fn expand_to_item(&mut self, items: &[RenderItem], target_id: &str) -> bool {
        let Some(index) = items.iter().position(|item| item.contains_id(target_id)) else {
            debug!(target_id, "expand_to_item: id not in timeline");
            return false;
        };
        let needed = items.len() - index + EXPAND_TO_PADDING;
        if needed > self.render_count {
            debug!(target_id, needed, "render window expanded to reach item");
            self.render_count = needed;
        }
        true
    }

    /// Expand while the viewport top sits within [`EXPAND_TRIGGER_GAP`] of
    /// the spacer/content boundary. A fast fling can outrun a single
    /// expansion, so this retries as a bounded loop, re-reading live
    /// metrics each round, until the position stabilizes outside the
    /// trigger zone, the window is fully open, or the round cap is hit.
    /// Returns the number of expansion rounds performed.
    pub fn expand_until_settled<V: Viewport>(&mut self, items: &[RenderItem], viewport: &V) -> usize {
        let mut rounds = 0;
        while rounds < MAX_EXPAND_ROUNDS {
            if self.hidden_prefix_len(items) == 0 {
                break;
            }
            let metrics = viewport.metrics();
            let boundary = self.spacer_height(items);
            if metrics.scroll_top >= boundary.saturating_add(EXPAND_TRIGGER_GAP) {
                break;
            }
            self.expand(EXPAND_STEP, items.len());
            rounds += 1;
        }
        if rounds > 0 {
            debug!(rounds, render_count = self.render_count, "render window expanded");
        }
        rounds
    }
}

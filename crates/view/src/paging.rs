//! History pagination: the collaborator that feeds older records into the
//! canonical store when the viewer keeps scrolling toward the start.
//!
//! The flow is always: observe the viewport (the anchor records the
//! current content height), pull a page with [`HistoryPager::load_older`],
//! rebuild and remount the timeline, then call
//! [`crate::ScrollAnchor::notify_older_content_loaded`] before the next
//! paint so the reading position holds still.

/// Source of older records, newest-remaining first.
pub trait HistoryPager {
    type Item;

    fn has_more(&self) -> bool;

    /// Next page of older records, ordered oldest-first so it can be
    /// prepended to the canonical log directly. Empty when exhausted.
    fn load_older(&mut self) -> Vec<Self::Item>;
}

/// In-memory pager over a fully-loaded backlog. Pages are served from the
/// newest end of the remaining backlog.
#[derive(Debug)]
pub struct BufferedPager<T> {
    older: Vec<T>,
    page_size: usize,
}

impl<T> BufferedPager<T> {
    /// `older` is the not-yet-shown backlog, oldest-first.
    pub fn new(older: Vec<T>, page_size: usize) -> Self {
        Self {
            older,
            page_size: page_size.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.older.len()
    }
}

impl<T> HistoryPager for BufferedPager<T> {
    type Item = T;

    fn has_more(&self) -> bool {
        !self.older.is_empty()
    }

    fn load_older(&mut self) -> Vec<T> {
        let start = self.older.len().saturating_sub(self.page_size);
        self.older.split_off(start)
    }
}

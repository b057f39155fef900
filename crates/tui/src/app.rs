//! Application state and input handling.
//!
//! The app owns one thread log, the built timeline, the render window and
//! the scroll anchor. Deferred work (bottom re-pins, window expansion,
//! history loads at the top edge) runs in [`App::after_frame`], once per
//! paint, so every decision reads geometry the viewer is actually seeing.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::text::Line;
use std::hash::{DefaultHasher, Hash, Hasher};
use threadview_core::Thread;
use threadview_core::model::Message;
use threadview_core::timeline::{RenderItem, build};
use threadview_view::paging::{BufferedPager, HistoryPager};
use threadview_view::viewport::{ROW_UNITS, ScrollMetrics, Viewport};
use threadview_view::{RenderWindow, ScrollAnchor};
use tracing::{debug, warn};

use crate::config::Config;
use crate::tail::FileTail;
use crate::ui;

/// Messages loaded into the timeline up front; anything older is served
/// by the history pager when the viewer reaches the top.
const INITIAL_LOG_MESSAGES: usize = 400;
const HISTORY_PAGE: usize = 100;
const SCROLL_STEP_ROWS: u32 = 3;

/// The terminal as a scroll container, in layout units.
#[derive(Debug, Default)]
pub struct TermViewport {
    pub scroll_top: u32,
    pub scroll_height: u32,
    pub client_height: u32,
}

impl Viewport for TermViewport {
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

pub struct App {
    pub thread: Thread,
    pub items: Vec<RenderItem>,
    pub window: RenderWindow,
    pub anchor: ScrollAnchor,
    pub viewport: TermViewport,
    pub should_quit: bool,
    follow_file: bool,
    tail: FileTail,
    pager: BufferedPager<Message>,
    /// Messages currently in the timeline (the newest part of the log).
    log: Vec<Message>,
    lines: Vec<Line<'static>>,
    lines_dirty: bool,
    last_width: u16,
    last_height: u16,
}

impl App {
    pub fn new(mut thread: Thread, tail: FileTail, follow_file: bool, config: &Config) -> Self {
        let mut window = RenderWindow::with_initial_count(config.window.initial_count);
        let mut anchor = ScrollAnchor::with_follow_threshold(config.follow.threshold);
        window.reset(&thread.thread_id);
        anchor.set_thread(&thread.thread_id);

        let mut backlog = std::mem::take(&mut thread.messages);
        let split = backlog.len().saturating_sub(INITIAL_LOG_MESSAGES);
        let log = backlog.split_off(split);
        let items = build(&log, &thread.events, &thread.compactions);

        Self {
            thread,
            items,
            window,
            anchor,
            viewport: TermViewport::default(),
            should_quit: false,
            follow_file,
            tail,
            pager: BufferedPager::new(backlog, HISTORY_PAGE),
            log,
            lines: Vec::new(),
            lines_dirty: true,
            last_width: 0,
            last_height: 0,
        }
    }

    // ── Layout ──

    /// Sync terminal lines and viewport geometry to the given area. Called
    /// at the top of every draw and after any content mutation.
    pub fn layout(&mut self, width: u16, height: u16) {
        if self.lines_dirty || width != self.last_width {
            self.lines = ui::timeline_lines(self.window.visible_slice(&self.items), width);
            self.lines_dirty = false;
        }
        self.last_width = width;
        self.last_height = height;
        self.viewport.scroll_height =
            self.spacer_height() + self.lines.len() as u32 * ROW_UNITS;
        self.viewport.client_height = u32::from(height) * ROW_UNITS;
        let max = self.viewport.metrics().max_scroll_top();
        if self.viewport.scroll_top > max {
            self.viewport.scroll_top = max;
        }
    }

    fn relayout(&mut self) {
        self.lines_dirty = true;
        if self.last_width > 0 {
            self.layout(self.last_width, self.last_height);
        }
    }

    pub fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }

    pub fn spacer_height(&self) -> u32 {
        self.window.spacer_height(&self.items)
    }

    pub fn has_older_history(&self) -> bool {
        self.pager.has_more()
    }

    // ── Frame work ──

    /// Poll the log file; on a settled change, swap in the fresh thread.
    /// A failed read (a half-flushed line, the file briefly missing during
    /// an atomic replace) keeps the current thread and is retried on the
    /// next poll; it never takes the viewer down.
    pub fn poll_live(&mut self) {
        if !self.follow_file {
            return;
        }
        match self.tail.poll() {
            Ok(Some(thread)) => self.update_thread(thread),
            Ok(None) => {}
            Err(err) => warn!(%err, "live reload failed, keeping current thread"),
        }
    }

    /// Deferred per-paint work: content-change pinning, pending re-pins,
    /// window expansion near the spacer boundary, history loads at the
    /// very top.
    pub fn after_frame(&mut self) {
        self.anchor
            .notify_content_changed(self.fingerprint(), &mut self.viewport);
        self.anchor.on_frame(&mut self.viewport);

        self.anchor.observe_scroll(&self.viewport);
        let before = self.viewport.metrics();
        let rounds = self.window.expand_until_settled(&self.items, &self.viewport);
        if rounds > 0 {
            self.relayout();
            if self.anchor.is_user_scrolled_up() {
                // Mounted items rarely match their spacer estimate, so the
                // content height just changed above the viewport. Expansion
                // never touches anything below the boundary, so keeping the
                // anchored content still means keeping its distance from
                // the content bottom.
                let from_bottom = before.scroll_height - before.scroll_top;
                self.viewport
                    .set_scroll_top(self.viewport.scroll_height.saturating_sub(from_bottom));
            } else {
                self.anchor.jump_to_bottom(&mut self.viewport);
            }
            self.anchor.observe_scroll(&self.viewport);
        }
        if self.viewport.scroll_top == 0
            && self.window.hidden_prefix_len(&self.items) == 0
            && self.pager.has_more()
        {
            self.load_older_history();
        }
    }

    /// Replace the thread with a freshly parsed revision. The backlog
    /// boundary is stable because the log is append-only.
    pub fn update_thread(&mut self, mut thread: Thread) {
        let mut backlog = std::mem::take(&mut thread.messages);
        let split = self.pager.remaining().min(backlog.len());
        let log = backlog.split_off(split);
        self.pager = BufferedPager::new(backlog, HISTORY_PAGE);
        self.log = log;
        self.window.reset(&thread.thread_id);
        self.anchor.set_thread(&thread.thread_id);
        self.thread = thread;
        self.rebuild();
        self.anchor
            .notify_content_changed(self.fingerprint(), &mut self.viewport);
    }

    /// Mount one page of older history above the timeline, keeping the
    /// viewer's reading position fixed.
    pub fn load_older_history(&mut self) {
        if !self.pager.has_more() {
            return;
        }
        self.anchor.observe_scroll(&self.viewport);
        let page = self.pager.load_older();
        debug!(count = page.len(), "mounting older history");
        let before = self.items.len();
        self.log.splice(0..0, page);
        self.rebuild();
        let added = self.items.len() - before;
        self.window.expand(added, self.items.len());
        self.relayout();
        self.anchor.notify_older_content_loaded(&mut self.viewport);
    }

    fn rebuild(&mut self) {
        self.items = build(&self.log, &self.thread.events, &self.thread.compactions);
        self.relayout();
    }

    /// Cheap content revision id: log shape plus everything that mutates
    /// in place (streaming text, tool outputs and statuses).
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.log.len().hash(&mut hasher);
        self.thread.events.len().hash(&mut hasher);
        self.thread.compactions.len().hash(&mut hasher);
        if let Some(last) = self.log.last() {
            last.id.hash(&mut hasher);
            last.text.len().hash(&mut hasher);
        }
        for message in &self.log {
            message.tool_calls.len().hash(&mut hasher);
            for call in &message.tool_calls {
                (call.status as u8).hash(&mut hasher);
                call.output.as_ref().map_or(0, String::len).hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    // ── Input ──

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(i64::from(SCROLL_STEP_ROWS)),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-i64::from(SCROLL_STEP_ROWS)),
            KeyCode::PageDown | KeyCode::Char('d') => self.scroll_by(self.half_page_rows()),
            KeyCode::PageUp | KeyCode::Char('u') => self.scroll_by(-self.half_page_rows()),
            KeyCode::Home | KeyCode::Char('g') => self.go_to_top(),
            KeyCode::End | KeyCode::Char('G') => self.jump_to_bottom(),
            KeyCode::Char('o') => {
                self.go_to_top();
                self.load_older_history();
            }
            _ => {}
        }
    }

    fn half_page_rows(&self) -> i64 {
        i64::from(self.last_height.max(2) / 2)
    }

    fn scroll_by(&mut self, delta_rows: i64) {
        let delta_units = delta_rows * i64::from(ROW_UNITS);
        let top = i64::from(self.viewport.scroll_top) + delta_units;
        self.viewport.set_scroll_top(top.max(0) as u32);
        self.anchor.observe_scroll(&self.viewport);
    }

    /// Open the window fully and park at the top of the loaded timeline.
    pub fn go_to_top(&mut self) {
        self.window.expand(self.items.len(), self.items.len());
        self.relayout();
        self.viewport.set_scroll_top(0);
        self.anchor.observe_scroll(&self.viewport);
    }

    pub fn jump_to_bottom(&mut self) {
        self.anchor.jump_to_bottom(&mut self.viewport);
    }
}

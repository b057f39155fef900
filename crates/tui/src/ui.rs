//! Timeline rendering.
//!
//! The visible window is laid out as a flat list of terminal lines; one
//! line is [`ROW_UNITS`] layout units tall, so scroll math in the view
//! layer and row math here stay in lockstep. Rows that fall inside the
//! spacer (the estimated stand-in for the hidden prefix) are drawn as
//! faint filler until the window expands over them.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use threadview_core::model::{
    CompactionEvent, Message, Role, ThreadEvent, ThreadEventKind, ToolCall, ToolStatus,
};
use threadview_core::timeline::{CallItem, GroupItem, RenderItem, ToolEntry};
use threadview_view::viewport::ROW_UNITS;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::App;
use crate::theme::Theme;

// ── Frame layout ──

pub fn render(frame: &mut Frame, app: &mut App) {
    let [timeline_area, status_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(frame.area());

    app.layout(timeline_area.width, timeline_area.height);

    let spacer_rows = (app.spacer_height() / ROW_UNITS) as usize;
    let first_row = (app.viewport.scroll_top / ROW_UNITS) as usize;
    let lines = app.lines();

    let mut rows: Vec<Line<'static>> = Vec::with_capacity(timeline_area.height as usize);
    for row in first_row..first_row + timeline_area.height as usize {
        if row < spacer_rows {
            rows.push(Line::styled("· · ·", Theme::dim()));
        } else if let Some(line) = lines.get(row - spacer_rows) {
            rows.push(line.clone());
        } else {
            rows.push(Line::default());
        }
    }
    frame.render_widget(Paragraph::new(rows), timeline_area);

    frame.render_widget(status_line(app), status_area);
}

fn status_line(app: &App) -> Paragraph<'static> {
    let follow = if app.anchor.is_user_scrolled_up() {
        "SCROLL"
    } else {
        "FOLLOW"
    };
    let title = app.thread.title.clone().unwrap_or_else(|| app.thread.thread_id.clone());
    let older = if app.has_older_history() { " · o older" } else { "" };
    let text = format!(
        " {title} · {msgs} msgs · {follow} · q quit · G bottom{older}",
        msgs = app.thread.stats.message_count,
    );
    Paragraph::new(Line::styled(text, Style::default().fg(Theme::STATUS_BAR)))
}

// ── Timeline lines ──

/// Flatten the visible items into terminal lines. Every item is followed
/// by one blank gap line; entries inside a run are packed tight.
pub fn timeline_lines(items: &[RenderItem], width: u16) -> Vec<Line<'static>> {
    let width = width.max(20) as usize;
    let mut lines = Vec::new();
    for item in items {
        match item {
            RenderItem::Message(message) => message_lines(message, width, &mut lines),
            RenderItem::Call(item) => call_lines(item, width, &mut lines),
            RenderItem::Group(group) => group_lines(group, &mut lines),
            RenderItem::Run(entries) => {
                for entry in entries {
                    match entry {
                        ToolEntry::Call(item) => call_lines(item, width, &mut lines),
                        ToolEntry::Group(group) => group_lines(group, &mut lines),
                    }
                }
            }
            RenderItem::Event(event) => event_lines(event, &mut lines),
            RenderItem::Compaction(compaction) => compaction_lines(compaction, &mut lines),
        }
        lines.push(Line::default());
    }
    lines
}

fn message_lines(message: &Message, width: usize, out: &mut Vec<Line<'static>>) {
    let role = match message.role {
        Role::User => "user",
        Role::Agent => "agent",
        Role::System => "system",
    };
    let mut header = format!("● {role}");
    if let Some(ts) = message.timestamp {
        header.push_str(&format!(" · {}", ts.format("%H:%M:%S")));
    }
    if let Some(model) = &message.model {
        header.push_str(&format!(" · {model}"));
    }
    out.push(Line::styled(header, Theme::role(message.role)));

    for line in wrap_text(&message.text, width) {
        out.push(Line::raw(line));
    }
    if !message.attachments.is_empty() {
        out.push(Line::styled(
            format!("  ⊞ {} attachment(s)", message.attachments.len()),
            Theme::dim(),
        ));
    }
}

fn call_lines(item: &CallItem, width: usize, out: &mut Vec<Line<'static>>) {
    out.push(call_line(&item.call));
    if let Some(plan) = &item.plan_text {
        out.push(Line::styled(
            "  ◈ plan".to_string(),
            Style::default().fg(Theme::PLAN).add_modifier(Modifier::BOLD),
        ));
        for line in wrap_text(plan, width.saturating_sub(4)) {
            out.push(Line::styled(format!("    {line}"), Style::default().fg(Theme::PLAN)));
        }
    }
}

fn group_lines(group: &GroupItem, out: &mut Vec<Line<'static>>) {
    out.push(Line::styled(
        format!("⚙ {} ×{}", group.name, group.calls.len()),
        Theme::tool(ToolStatus::Ok).add_modifier(Modifier::BOLD),
    ));
    for call in &group.calls {
        out.push(Line::from(vec![
            Span::styled("  · ".to_string(), Theme::dim()),
            Span::styled(input_summary(call), Theme::tool(call.status)),
        ]));
    }
}

fn call_line(call: &ToolCall) -> Line<'static> {
    let glyph = match call.status {
        ToolStatus::Pending => "…",
        ToolStatus::Ok => "✓",
        ToolStatus::Error => "✗",
    };
    Line::from(vec![
        Span::styled(format!("⚙ {} {glyph} ", call.name), Theme::tool(call.status)),
        Span::styled(input_summary(call), Theme::dim()),
    ])
}

fn event_lines(event: &ThreadEvent, out: &mut Vec<Line<'static>>) {
    let label = match event.kind {
        ThreadEventKind::Commit => "commit",
        ThreadEventKind::Push => "push",
        ThreadEventKind::Merge => "merge",
        ThreadEventKind::PullRequestCreated => "pull request",
        ThreadEventKind::BranchCreated => "branch",
        ThreadEventKind::Changed => "changed",
        ThreadEventKind::Custom => "event",
    };
    let detail = event
        .data
        .get("message")
        .or_else(|| event.data.get("title"))
        .or_else(|| event.data.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    out.push(Line::styled(
        format!("⎇ {label} {detail}").trim_end().to_string(),
        Style::default().fg(Theme::EVENT),
    ));
}

fn compaction_lines(compaction: &CompactionEvent, out: &mut Vec<Line<'static>>) {
    out.push(Line::styled(
        format!(
            "✂ context compacted · {} tokens · {}",
            compaction.pre_tokens, compaction.reason
        ),
        Style::default().fg(Theme::COMPACTION),
    ));
}

/// One-line description of a tool call's input: the obvious scalar field
/// when there is one, compact JSON otherwise.
fn input_summary(call: &ToolCall) -> String {
    for field in ["path", "file_path", "command", "query", "url"] {
        if let Some(value) = call.input.get(field).and_then(|v| v.as_str()) {
            return truncate(value, 80);
        }
    }
    match &call.input {
        serde_json::Value::Null => String::new(),
        other => truncate(&other.to_string(), 80),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut w = 0;
    for ch in s.chars() {
        let cw = ch.width().unwrap_or(0);
        if w + cw > max.saturating_sub(1) {
            break;
        }
        out.push(ch);
        w += cw;
    }
    out.push('…');
    out
}

/// Greedy word wrap by display width; overlong words are hard-split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(8);
    let mut out = Vec::new();
    for raw in text.lines() {
        if raw.trim().is_empty() {
            out.push(String::new());
            continue;
        }
        let mut line = String::new();
        let mut line_width = 0;
        for word in raw.split_whitespace() {
            let word_width = word.width();
            if word_width > width {
                if !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                for chunk in hard_split(word, width) {
                    out.push(chunk);
                }
                continue;
            }
            if line_width == 0 {
                line.push_str(word);
                line_width = word_width;
            } else if line_width + 1 + word_width <= width {
                line.push(' ');
                line.push_str(word);
                line_width += 1 + word_width;
            } else {
                out.push(std::mem::take(&mut line));
                line.push_str(word);
                line_width = word_width;
            }
        }
        if !line.is_empty() {
            out.push(line);
        }
    }
    out
}

fn hard_split(word: &str, width: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut w = 0;
    for ch in word.chars() {
        let cw = ch.width().unwrap_or(0);
        if w + cw > width && !chunk.is_empty() {
            chunks.push(std::mem::take(&mut chunk));
            w = 0;
        }
        chunk.push(ch);
        w += cw;
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadview_core::model::Role;
    use threadview_core::testing::{call_at, compaction_at, event_at, message};
    use threadview_core::timeline::build;

    #[test]
    fn every_item_ends_with_a_gap_line() {
        let messages = vec![
            message("m1", Role::User, "hello"),
            message("m2", Role::Agent, "hi"),
        ];
        let items = build(&messages, &[], &[]);
        let lines = timeline_lines(&items, 80);
        // Two items, each header + one text line + gap.
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[2], Line::default());
        assert_eq!(lines[5], Line::default());
    }

    #[test]
    fn run_entries_are_packed_tight() {
        let mut m = message("m1", Role::Agent, "");
        m.tool_calls = vec![
            call_at("c1", "read", 1),
            call_at("c2", "grep", 2),
            call_at("c3", "read", 3),
        ];
        let items = build(&[m], &[], &[]);
        assert_eq!(items.len(), 1); // one run
        let lines = timeline_lines(&items, 80);
        // Three call lines plus a single trailing gap for the whole run.
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], Line::default());
    }

    #[test]
    fn event_and_compaction_render_one_line_each() {
        let events = vec![event_at("e1", threadview_core::model::ThreadEventKind::Commit, 1)];
        let items = build(&[], &events, &[compaction_at(2)]);
        let lines = timeline_lines(&items, 80);
        assert_eq!(lines.len(), 4); // event + gap + compaction + gap
        assert!(lines[2].to_string().contains("context compacted"));
    }

    #[test]
    fn input_summary_prefers_path_fields() {
        let mut call = call_at("c1", "read", 1);
        call.input = serde_json::json!({"path": "src/main.rs", "limit": 10});
        assert_eq!(input_summary(&call), "src/main.rs");
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("one two three four five six seven", 12);
        assert!(lines.iter().all(|l| l.width() <= 12));
        assert_eq!(lines.join(" "), "one two three four five six seven");
    }

    #[test]
    fn wrap_hard_splits_long_words() {
        let lines = wrap_text("aaaaaaaaaaaaaaaaaaaaaaaa", 8);
        assert_eq!(lines, vec!["aaaaaaaa", "aaaaaaaa", "aaaaaaaa"]);
    }
}

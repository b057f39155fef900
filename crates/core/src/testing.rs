//! Shared fixture builders for tests. Compiled into downstream test builds
//! via the `testing` feature.

use crate::model::{
    CompactionEvent, Message, Role, Thread, ThreadEvent, ThreadEventKind, ToolCall,
};
use chrono::{DateTime, TimeZone, Utc};

/// Deterministic timestamp `secs` seconds past a fixed epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_760_000_000 + secs, 0).single().unwrap()
}

pub fn message(id: &str, role: Role, text: &str) -> Message {
    Message::new(id, role, text)
}

pub fn call_at(id: &str, name: &str, secs: i64) -> ToolCall {
    let mut call = ToolCall::new(id, name, serde_json::json!({}));
    call.timestamp = Some(ts(secs));
    call
}

pub fn event_at(id: &str, kind: ThreadEventKind, secs: i64) -> ThreadEvent {
    ThreadEvent {
        id: id.to_string(),
        kind,
        created_at: Some(ts(secs)),
        data: serde_json::json!({}),
    }
}

pub fn compaction_at(secs: i64) -> CompactionEvent {
    CompactionEvent {
        timestamp: ts(secs),
        pre_tokens: 180_000,
        reason: "auto".to_string(),
    }
}

/// Thread with `n` alternating user/agent text messages, each timestamped
/// one second apart.
pub fn thread_with_messages(n: usize) -> Thread {
    let mut thread = Thread::new("fixture-thread".to_string());
    for i in 0..n {
        let role = if i % 2 == 0 { Role::User } else { Role::Agent };
        let mut m = Message::new(format!("m{i}"), role, format!("message {i}"));
        m.timestamp = Some(ts(i as i64));
        thread.messages.push(m);
    }
    thread.recompute_stats();
    thread
}

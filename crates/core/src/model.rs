use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tool that writes a file. Its input carries `path` and `content`.
pub const TOOL_WRITE: &str = "write";
/// Tool that presents a plan for approval. Interactive.
pub const TOOL_EXIT_PLAN: &str = "exit_plan";
/// Tool that replaces the todo list with a fresh snapshot. Latest wins.
pub const TOOL_TODO: &str = "todo_write";
/// Tool that asks the user a question. Interactive.
pub const TOOL_ASK_USER: &str = "ask_user";

/// Tools that need an independent response affordance per instance and
/// therefore must never be merged into a group.
pub const INTERACTIVE_TOOLS: &[&str] = &[TOOL_EXIT_PLAN, TOOL_ASK_USER];

/// Top-level thread - the root of a threadview conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Format version, e.g. "thread-1.0.0"
    pub version: String,
    /// Unique thread identifier
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Canonical ordered message log. Append-only; never reordered.
    pub messages: Vec<Message>,
    /// Out-of-band lifecycle events (side channel)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ThreadEvent>,
    /// Context-compaction markers (side channel)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compactions: Vec<CompactionEvent>,
    /// Aggregate statistics
    #[serde(default)]
    pub stats: Stats,
}

impl Thread {
    pub const CURRENT_VERSION: &'static str = "thread-1.0.0";

    pub fn new(thread_id: String) -> Self {
        let now = Utc::now();
        Self {
            version: Self::CURRENT_VERSION.to_string(),
            thread_id,
            title: None,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            events: Vec::new(),
            compactions: Vec::new(),
            stats: Stats::default(),
        }
    }

    /// Recompute stats from the log
    pub fn recompute_stats(&mut self) {
        let tool_call_count = self.messages.iter().map(|m| m.tool_calls.len() as u64).sum();
        let duration_seconds = match (
            self.messages.iter().find_map(|m| m.timestamp),
            self.messages.iter().rev().find_map(|m| m.timestamp),
        ) {
            (Some(first), Some(last)) => (last - first).num_seconds().max(0) as u64,
            _ => 0,
        };

        self.stats = Stats {
            message_count: self.messages.len() as u64,
            tool_call_count,
            event_count: self.events.len() as u64,
            compaction_count: self.compactions.len() as u64,
            duration_seconds,
        };
    }
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

/// A single entry in the canonical message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    pub role: Role,
    /// Message text, may be empty for pure tool-call turns
    #[serde(default)]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Tool calls owned by this message, in invocation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Model that produced an agent message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            text: text.into(),
            timestamp: None,
            tool_calls: Vec::new(),
            attachments: Vec::new(),
            model: None,
            permission_mode: None,
        }
    }

    /// True when the message carries no displayable text of its own.
    pub fn is_text_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Image attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Result state of a tool call. `output` arrives asynchronously, so a call
/// starts pending and is updated in place when the result lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Pending,
    Ok,
    Error,
}

/// A tool invocation owned by exactly one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the thread
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            output: None,
            status: ToolStatus::Pending,
            timestamp: None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        INTERACTIVE_TOOLS.contains(&self.name.as_str())
    }
}

/// Kind of out-of-band thread event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreadEventKind {
    Commit,
    Push,
    Merge,
    PullRequestCreated,
    BranchCreated,
    /// Bookkeeping marker emitted by the repo watcher; never rendered.
    Changed,
    Custom,
}

/// Out-of-band lifecycle event, independent of message ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEvent {
    pub id: String,
    pub kind: ThreadEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Opaque payload, shape depends on `kind`
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Marker recording that the context window was compacted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionEvent {
    pub timestamp: DateTime<Utc>,
    /// Token count immediately before compaction
    pub pre_tokens: u64,
    pub reason: String,
}

/// Aggregate thread statistics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub message_count: u64,
    pub tool_call_count: u64,
    pub event_count: u64,
    pub compaction_count: u64,
    pub duration_seconds: u64,
}

/// Whether a written file follows the plan-file naming convention
/// (markdown file whose name mentions "plan", e.g. `PLAN.md`,
/// `implementation-plan.md`).
pub fn is_plan_file(path: &str) -> bool {
    let name = std::path::Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path);
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".md") && lower.contains("plan")
}

//! Thread-log JSONL format: streaming serialization/deserialization
//!
//! A `.thread.jsonl` file has the structure:
//! ```jsonl
//! {"type":"header","version":"thread-1.0.0","thread_id":"...","title":"...","created_at":"...","updated_at":"..."}
//! {"type":"message","id":"m1","role":"user","text":"...","timestamp":"..."}
//! {"type":"event","id":"e1","kind":"commit","created_at":"...","data":{...}}
//! {"type":"compaction","timestamp":"...","pre_tokens":180000,"reason":"auto"}
//! {"type":"stats","message_count":42,...}
//! ```
//!
//! The header line carries thread metadata. Message, event and compaction
//! lines may be interleaved in any order; each collection keeps its own
//! file order. The trailing stats line is optional on write and recomputed
//! on read when missing.

use crate::model::{CompactionEvent, Message, Stats, Thread, ThreadEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// A single line in a thread JSONL file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
#[non_exhaustive]
pub enum ThreadLine {
    Header {
        version: String,
        thread_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    Message(Message),
    Event(ThreadEvent),
    Compaction(CompactionEvent),
    Stats(Stats),
}

/// Error types for JSONL operations
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Missing header line")]
    MissingHeader,
    #[error("Unexpected line type at line {0}: expected header")]
    UnexpectedLineType(usize),
}

/// Write a Thread as JSONL to a writer
pub fn write_jsonl<W: Write>(thread: &Thread, mut writer: W) -> Result<(), JsonlError> {
    let mut line_num = 1usize;
    let mut write_line = |line: &ThreadLine, n: usize| -> Result<(), JsonlError> {
        serde_json::to_writer(&mut writer, line)
            .map_err(|e| JsonlError::Json { line: n, source: e })?;
        writer.write_all(b"\n")?;
        Ok(())
    };

    let header = ThreadLine::Header {
        version: thread.version.clone(),
        thread_id: thread.thread_id.clone(),
        title: thread.title.clone(),
        created_at: thread.created_at,
        updated_at: thread.updated_at,
    };
    write_line(&header, line_num)?;

    for message in &thread.messages {
        line_num += 1;
        write_line(&ThreadLine::Message(message.clone()), line_num)?;
    }
    for event in &thread.events {
        line_num += 1;
        write_line(&ThreadLine::Event(event.clone()), line_num)?;
    }
    for compaction in &thread.compactions {
        line_num += 1;
        write_line(&ThreadLine::Compaction(compaction.clone()), line_num)?;
    }
    write_line(&ThreadLine::Stats(thread.stats.clone()), line_num + 1)?;

    Ok(())
}

/// Write a Thread as JSONL to a String
pub fn to_jsonl_string(thread: &Thread) -> Result<String, JsonlError> {
    let mut buf = Vec::new();
    write_jsonl(thread, &mut buf)?;
    // Safe: serde_json always produces valid UTF-8
    Ok(String::from_utf8(buf).unwrap_or_default())
}

/// Read a Thread from a JSONL reader
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Thread, JsonlError> {
    let mut lines = reader.lines();

    let header_str = lines.next().ok_or(JsonlError::MissingHeader)??;
    let header: ThreadLine =
        serde_json::from_str(&header_str).map_err(|e| JsonlError::Json { line: 1, source: e })?;

    let (version, thread_id, title, created_at, updated_at) = match header {
        ThreadLine::Header {
            version,
            thread_id,
            title,
            created_at,
            updated_at,
        } => (version, thread_id, title, created_at, updated_at),
        _ => return Err(JsonlError::UnexpectedLineType(1)),
    };

    let mut messages = Vec::new();
    let mut events = Vec::new();
    let mut compactions = Vec::new();
    let mut stats = None;
    let mut line_num = 1usize;

    for line_result in lines {
        line_num += 1;
        let line_str = line_result?;
        if line_str.is_empty() {
            continue;
        }

        let line: ThreadLine = serde_json::from_str(&line_str).map_err(|e| JsonlError::Json {
            line: line_num,
            source: e,
        })?;

        match line {
            ThreadLine::Message(message) => messages.push(message),
            ThreadLine::Event(event) => events.push(event),
            ThreadLine::Compaction(compaction) => compactions.push(compaction),
            ThreadLine::Stats(s) => stats = Some(s),
            ThreadLine::Header { .. } => {
                // Ignore duplicate headers
            }
        }
    }

    let has_stats = stats.is_some();
    let mut thread = Thread {
        version,
        thread_id,
        title,
        created_at,
        updated_at,
        messages,
        events,
        compactions,
        stats: stats.unwrap_or_default(),
    };

    if !has_stats {
        thread.recompute_stats();
    }

    Ok(thread)
}

/// Read a Thread from a JSONL string
pub fn from_jsonl_str(s: &str) -> Result<Thread, JsonlError> {
    read_jsonl(io::BufReader::new(s.as_bytes()))
}

/// Read a Thread from a file path
pub fn read_jsonl_file(path: &std::path::Path) -> Result<Thread, JsonlError> {
    let file = std::fs::File::open(path)?;
    read_jsonl(io::BufReader::new(file))
}

//! Live tail of a thread log file.
//!
//! Polls file metadata (mtime + length) instead of watching, which works
//! on every filesystem including network mounts. Writers append in bursts,
//! so a change only triggers a reload after a quiet debounce period.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use threadview_core::Thread;
use threadview_core::jsonl::read_jsonl_file;
use tracing::debug;

pub struct FileTail {
    path: PathBuf,
    last_mtime: Option<SystemTime>,
    last_len: u64,
    dirty_since: Option<Instant>,
    debounce: Duration,
}

impl FileTail {
    pub fn new(path: PathBuf, debounce: Duration) -> Self {
        Self {
            path,
            last_mtime: None,
            last_len: 0,
            dirty_since: None,
            debounce,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file immediately and mark its current state as seen.
    pub fn load_now(&mut self) -> Result<Thread> {
        let meta = fs::metadata(&self.path)
            .with_context(|| format!("stat {}", self.path.display()))?;
        self.last_mtime = meta.modified().ok();
        self.last_len = meta.len();
        self.dirty_since = None;
        read_jsonl_file(&self.path)
            .with_context(|| format!("read {}", self.path.display()))
    }

    /// One poll step. Returns a freshly parsed thread once a change has
    /// settled for the debounce period, `None` otherwise.
    pub fn poll(&mut self) -> Result<Option<Thread>> {
        let meta = fs::metadata(&self.path)
            .with_context(|| format!("stat {}", self.path.display()))?;
        let mtime = meta.modified().ok();
        let len = meta.len();

        if mtime != self.last_mtime || len != self.last_len {
            debug!(path = %self.path.display(), len, "log file changed, debouncing");
            self.last_mtime = mtime;
            self.last_len = len;
            self.dirty_since = Some(Instant::now());
            return Ok(None);
        }

        if let Some(since) = self.dirty_since
            && since.elapsed() >= self.debounce
        {
            // Cleared only on success: a failed read (half-flushed line)
            // stays dirty and is retried on the next poll.
            let thread = read_jsonl_file(&self.path)
                .with_context(|| format!("read {}", self.path.display()))?;
            self.dirty_since = None;
            return Ok(Some(thread));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadview_core::jsonl::to_jsonl_string;
    use threadview_core::model::{Message, Role};

    fn write_thread(path: &Path, message_count: usize) {
        let mut thread = Thread::new("t-tail".to_string());
        for i in 0..message_count {
            thread
                .messages
                .push(Message::new(format!("m{i}"), Role::Agent, "hi"));
        }
        thread.recompute_stats();
        fs::write(path, to_jsonl_string(&thread).unwrap()).unwrap();
    }

    #[test]
    fn load_now_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.thread.jsonl");
        write_thread(&path, 3);

        let mut tail = FileTail::new(path, Duration::ZERO);
        let thread = tail.load_now().unwrap();
        assert_eq!(thread.messages.len(), 3);
        // Nothing changed since, so polling stays quiet.
        assert!(tail.poll().unwrap().is_none());
    }

    #[test]
    fn poll_reloads_after_a_change_settles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.thread.jsonl");
        write_thread(&path, 1);

        let mut tail = FileTail::new(path.clone(), Duration::ZERO);
        tail.load_now().unwrap();

        write_thread(&path, 2);
        // First poll notices the change and starts the quiet period.
        assert!(tail.poll().unwrap().is_none());
        // Zero debounce: the next poll delivers the reload.
        let thread = tail.poll().unwrap().expect("reload");
        assert_eq!(thread.messages.len(), 2);
    }

    #[test]
    fn failed_reload_keeps_retrying_until_the_log_heals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.thread.jsonl");
        write_thread(&path, 1);
        let mut tail = FileTail::new(path.clone(), Duration::ZERO);
        tail.load_now().unwrap();

        // The writer flushed a partial line and went quiet.
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("{\"type\":\"mess");
        fs::write(&path, &contents).unwrap();

        assert!(tail.poll().unwrap().is_none()); // change observed
        assert!(tail.poll().is_err()); // parse fails after the quiet period
        // The dirty state sticks, so the read is retried rather than
        // silently dropped.
        assert!(tail.poll().is_err());

        write_thread(&path, 2);
        assert!(tail.poll().unwrap().is_none());
        let thread = tail.poll().unwrap().expect("reload");
        assert_eq!(thread.messages.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tail = FileTail::new(dir.path().join("nope.jsonl"), Duration::ZERO);
        assert!(tail.load_now().is_err());
    }
}

//! Session journal: append-only JSONL record of connection lifecycle events.
//!
//! One line per event: connect attempts, handshakes, collector failures,
//! rendered results, dropped messages and closes. Result contents are never
//! stored; a `result_rendered` line only marks that a result arrived. Read
//! back by `riskwatch history`.
//!
//! Log file: `~/.riskwatch/sessions.jsonl` (configurable).

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::client::identity::SessionIdentity;
use crate::config::schema::{LoggingConfig, expand_home};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    ConnectFailed,
    HandshakeSent,
    CollectorFailed,
    ResultRendered,
    MessageDropped,
    Closed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::ConnectFailed => "connect_failed",
            Self::HandshakeSent => "handshake_sent",
            Self::CollectorFailed => "collector_failed",
            Self::ResultRendered => "result_rendered",
            Self::MessageDropped => "message_dropped",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A single journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: String,
    pub event: EventKind,
    pub user_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub close_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

impl JournalEntry {
    pub fn new(event: EventKind, identity: &SessionIdentity) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event,
            user_id: identity.user_id.clone(),
            session_id: identity.session_id.clone(),
            close_code: None,
            detail: None,
        }
    }

    pub fn with_close_code(mut self, code: u16) -> Self {
        self.close_code = Some(code);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Handle to the journal file. A disabled journal drops every entry.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    path: Option<PathBuf>,
}

impl Journal {
    pub fn from_config(config: &LoggingConfig) -> Self {
        if config.journal {
            Self::at(expand_home(&config.journal_path))
        } else {
            Self::disabled()
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an entry. Best-effort: I/O failures are logged and swallowed.
    pub fn record(&self, entry: &JournalEntry) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_entry(path, entry) {
            tracing::debug!(path = %path.display(), error = %e, "journal write failed");
        }
    }

    /// Read all entries, skipping malformed lines. Empty if the file is missing.
    pub fn read_all(&self) -> Vec<JournalEntry> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<JournalEntry>(&line).ok())
            .collect()
    }

    /// The last `limit` entries, oldest first.
    pub fn read_recent(&self, limit: usize) -> Vec<JournalEntry> {
        let mut entries = self.read_all();
        let skip = entries.len().saturating_sub(limit);
        entries.split_off(skip)
    }
}

fn append_entry(path: &Path, entry: &JournalEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{json}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_back_entries() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::at(dir.path().join("nested").join("sessions.jsonl"));
        let identity = SessionIdentity::new("frank", None);

        journal.record(&JournalEntry::new(EventKind::Connected, &identity));
        journal.record(&JournalEntry::new(EventKind::ResultRendered, &identity));
        journal.record(
            &JournalEntry::new(EventKind::Closed, &identity)
                .with_close_code(1000)
                .with_detail("bye"),
        );

        let entries = journal.read_all();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].event, EventKind::ResultRendered);
        assert_eq!(entries[1].detail, None);
        assert_eq!(entries[2].close_code, Some(1000));
        assert_eq!(entries[2].session_id, identity.session_id);
    }

    #[test]
    fn read_recent_keeps_tail() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::at(dir.path().join("sessions.jsonl"));
        let identity = SessionIdentity::new("g", None);
        for i in 0..5 {
            journal.record(
                &JournalEntry::new(EventKind::MessageDropped, &identity).with_detail(i.to_string()),
            );
        }

        let recent = journal.read_recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].detail.as_deref(), Some("3"));
        assert_eq!(recent[1].detail.as_deref(), Some("4"));
    }

    #[test]
    fn rendered_lines_carry_no_result_data() {
        let identity = SessionIdentity::new("r", None);
        let line =
            serde_json::to_string(&JournalEntry::new(EventKind::ResultRendered, &identity)).unwrap();
        assert!(!line.contains("score"));
        assert!(line.contains(r#""event":"result_rendered""#));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.jsonl");
        let identity = SessionIdentity::new("h", None);
        let good = serde_json::to_string(&JournalEntry::new(EventKind::Connected, &identity)).unwrap();
        fs::write(&path, format!("garbage\n{good}\n")).unwrap();

        assert_eq!(Journal::at(&path).read_all().len(), 1);
    }

    #[test]
    fn disabled_journal_is_silent() {
        let journal = Journal::disabled();
        journal.record(&JournalEntry::new(
            EventKind::Connected,
            &SessionIdentity::new("i", None),
        ));
        assert!(journal.read_all().is_empty());
        assert!(journal.path().is_none());
    }
}

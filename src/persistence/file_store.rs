//! Line-format store: `<topic> <user> <remaining_seconds> <body>` per line.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::utils::error::Result;

/// One saved persisted message. `remaining` is the lifetime left at save
/// time, not the original duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub topic: String,
    pub sender: String,
    pub remaining: u32,
    pub body: String,
}

impl StoredMessage {
    fn to_line(&self) -> String {
        // the line format cannot carry embedded newlines
        let body = self.body.replace(['\n', '\r'], " ");
        format!("{} {} {} {}", self.topic, self.sender, self.remaining, body)
    }

    fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(4, ' ');
        let topic = parts.next().filter(|s| !s.is_empty())?;
        let sender = parts.next().filter(|s| !s.is_empty())?;
        let remaining: u32 = parts.next()?.parse().ok()?;
        let body = parts.next()?;
        Some(Self {
            topic: topic.to_string(),
            sender: sender.to_string(),
            remaining,
            body: body.to_string(),
        })
    }
}

/// Plain-text message store at a fixed path.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the store with the given messages, one line each.
    pub fn save(&self, messages: &[StoredMessage]) -> Result<()> {
        let mut file = fs::File::create(&self.path)?;
        for msg in messages {
            writeln!(file, "{}", msg.to_line())?;
        }
        info!(path = %self.path.display(), count = messages.len(), "Persisted messages saved");
        Ok(())
    }

    /// Reads the store back. A missing file is an empty store, not an error;
    /// malformed lines are skipped with a diagnostic.
    pub fn load(&self) -> Result<Vec<StoredMessage>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No message store found; starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut messages = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            match StoredMessage::parse_line(line) {
                Some(msg) => messages.push(msg),
                None => {
                    warn!(path = %self.path.display(), line = line_no + 1, "Skipping malformed store line");
                }
            }
        }
        info!(path = %self.path.display(), count = messages.len(), "Persisted messages loaded");
        Ok(messages)
    }
}

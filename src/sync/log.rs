use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use crate::config::data_dir;
use crate::model::board::WatchTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub timestamp: String,
    pub issue_key: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Append-only JSONL journal of watcher activity.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Journal at `~/.donesync/sync-activity.jsonl`.
    pub fn default_location() -> Self {
        Self::new(data_dir().join("sync-activity.jsonl"))
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn append(&self, event: &SyncEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Records an event for a target. Journal failures are logged and swallowed.
    pub fn record(&self, target: &WatchTarget, event_type: &str, message: Option<&str>) {
        let event = new_event(
            &target.issue_key,
            event_type,
            Some(&target.item_id),
            Some(&target.item_name),
            message,
        );
        if let Err(e) = self.append(&event) {
            debug!(error = %e, "Failed to append sync activity");
        }
    }

    /// Records an event for an issue that is not bound to a board item.
    pub fn record_issue(&self, issue_key: &str, event_type: &str, message: Option<&str>) {
        let event = new_event(issue_key, event_type, None, None, message);
        if let Err(e) = self.append(&event) {
            debug!(error = %e, "Failed to append sync activity");
        }
    }

    pub fn read_events(&self, issue_key: Option<&str>, limit: Option<usize>) -> Vec<SyncEvent> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        if !path.exists() {
            return Vec::new();
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut events: Vec<SyncEvent> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .filter(|e: &SyncEvent| issue_key.map_or(true, |k| e.issue_key == k))
            .collect();

        if let Some(limit) = limit {
            let len = events.len();
            if len > limit {
                events = events.split_off(len - limit);
            }
        }

        events
    }
}

pub fn new_event(
    issue_key: &str,
    event_type: &str,
    item_id: Option<&str>,
    item_name: Option<&str>,
    message: Option<&str>,
) -> SyncEvent {
    SyncEvent {
        timestamp: chrono::Utc::now().to_rfc3339(),
        issue_key: issue_key.to_string(),
        event: event_type.to_string(),
        item_id: item_id.map(String::from),
        item_name: item_name.map(String::from),
        message: message.map(String::from),
    }
}

use serde_json::Value;

/// Coarse status classification reported by the issue tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Todo,
    InProgress,
    Done,
    Unknown,
}

impl StatusCategory {
    /// Maps a Jira `statusCategory.key` ("new", "indeterminate", "done") onto a category.
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "new" | "todo" | "to-do" => StatusCategory::Todo,
            "indeterminate" | "in-progress" => StatusCategory::InProgress,
            "done" => StatusCategory::Done,
            _ => StatusCategory::Unknown,
        }
    }
}

/// One fetch of an issue and the keys of its sub-tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSnapshot {
    pub key: String,
    pub status_name: Option<String>,
    pub status_category: Option<StatusCategory>,
    pub subtasks: Vec<String>,
}

impl IssueSnapshot {
    /// Builds a snapshot from a Jira issue payload. Never fails: fields that are
    /// missing or of the wrong shape are left empty.
    pub fn from_json(requested_key: &str, body: &Value) -> Self {
        let key = body
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or(requested_key)
            .to_string();

        let status = body.get("fields").and_then(|f| f.get("status"));
        let status_name = status
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .map(String::from);
        let status_category = status
            .and_then(|s| s.get("statusCategory"))
            .and_then(|c| c.get("key"))
            .and_then(Value::as_str)
            .map(StatusCategory::from_key);

        let subtasks = body
            .get("fields")
            .and_then(|f| f.get("subtasks"))
            .and_then(Value::as_array)
            .map(|subs| {
                subs.iter()
                    .filter_map(|s| s.get("key").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            key,
            status_name,
            status_category,
            subtasks,
        }
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// Status name for display, falling back to "unknown".
    pub fn status_label(&self) -> &str {
        self.status_name.as_deref().unwrap_or("unknown")
    }
}

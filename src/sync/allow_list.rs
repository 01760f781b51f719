use serde::Deserialize;
use std::collections::HashSet;

/// Issue keys and board item names allowed to trigger a write.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllowList {
    #[serde(default)]
    issues: HashSet<String>,
    #[serde(default)]
    items: HashSet<String>,
}

impl AllowList {
    pub fn new<I, N>(issues: I, items: N) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            issues: issues.into_iter().map(Into::into).collect(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Both the issue key and the item name must be listed. Matching is exact.
    pub fn is_eligible(&self, issue_key: &str, item_name: &str) -> bool {
        self.issues.contains(issue_key) && self.items.contains(item_name)
    }

    /// Item-only check, for writes not tied to an issue. Matching is exact.
    pub fn allows_item(&self, item_name: &str) -> bool {
        self.items.contains(item_name)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() || self.items.is_empty()
    }
}

use serde::Serialize;

/// A row on the destination board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardItem {
    pub id: String,
    pub name: String,
}

/// A board item together with the raw text of its linked-issue column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedItem {
    pub item: BoardItem,
    pub link_text: String,
}

/// An item located by name, with the board it lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundItem {
    pub board_id: String,
    pub item: BoardItem,
}

/// Binds one issue to one board item for the lifetime of a watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchTarget {
    pub issue_key: String,
    pub board_id: String,
    pub item_id: String,
    pub item_name: String,
}

impl WatchTarget {
    pub fn new(issue_key: impl Into<String>, board_id: impl Into<String>, item: &BoardItem) -> Self {
        Self {
            issue_key: issue_key.into(),
            board_id: board_id.into(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
        }
    }
}

/// Result of a status write that reached the board API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The mutation was applied. Carries the item's name and new status text if returned.
    Applied {
        item_name: String,
        status_text: Option<String>,
    },
    /// The transport succeeded but the mutation was rejected.
    Rejected(Vec<String>),
}

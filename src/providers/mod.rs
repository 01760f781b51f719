pub mod credential;
pub mod jira;
pub mod monday;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::board::{FoundItem, LinkedItem, WriteOutcome};
use crate::model::issue::IssueSnapshot;

pub use credential::Credential;

/// Read side of the source tracker.
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_issue(&self, key: &str) -> SyncResult<IssueSnapshot>;
}

/// Read/write side of the destination board.
#[async_trait]
pub trait Board: Send + Sync {
    fn name(&self) -> &str;
    /// Items that carry a non-blank linked-issue annotation. Unlinked items are omitted.
    async fn list_linked_items(&self, board_id: &str) -> SyncResult<Vec<LinkedItem>>;
    /// First item on any of `board_ids` whose name matches `name`, ignoring case.
    async fn find_item_by_name(
        &self,
        board_ids: &[String],
        name: &str,
    ) -> SyncResult<Option<FoundItem>>;
    async fn set_item_status(
        &self,
        item_id: &str,
        board_id: &str,
        label: &str,
    ) -> SyncResult<WriteOutcome>;
}

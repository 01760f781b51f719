use tracing::{info, warn};

use super::allow_list::AllowList;
use crate::error::SyncResult;
use crate::model::board::{FoundItem, WriteOutcome};
use crate::providers::Board;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    NotFound,
    /// The item exists but its name is not allow-listed. Nothing was written.
    NotAllowed(FoundItem),
    Marked {
        found: FoundItem,
        outcome: WriteOutcome,
    },
}

/// Looks an item up by name on `board_ids` and sets its status to `label`.
///
/// The lookup ignores case; the allow-list check uses the name as stored on the board.
pub async fn mark_item(
    board: &dyn Board,
    allow_list: &AllowList,
    board_ids: &[String],
    name: &str,
    label: &str,
) -> SyncResult<MarkOutcome> {
    let Some(found) = board.find_item_by_name(board_ids, name).await? else {
        info!(item = name, boards = ?board_ids, "Item not found");
        return Ok(MarkOutcome::NotFound);
    };

    if !allow_list.allows_item(&found.item.name) {
        warn!(item = %found.item.name, "Skipped: outside allow-list");
        return Ok(MarkOutcome::NotAllowed(found));
    }

    let outcome = board
        .set_item_status(&found.item.id, &found.board_id, label)
        .await?;
    match &outcome {
        WriteOutcome::Applied { status_text, .. } => info!(
            item = %found.item.name,
            item_id = %found.item.id,
            board = %found.board_id,
            status = status_text.as_deref().unwrap_or(label),
            "Marked board item"
        ),
        WriteOutcome::Rejected(errors) => warn!(
            item = %found.item.name,
            error = %errors.join("; "),
            "Board rejected status update"
        ),
    }
    Ok(MarkOutcome::Marked { found, outcome })
}

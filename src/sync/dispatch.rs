use serde::Serialize;
use tracing::{debug, info};

use super::link::parse_linked_key;
use super::watch::{self, WatchHandle, WatchReport};
use super::SyncContext;
use crate::error::SyncResult;
use crate::model::board::{LinkedItem, WatchTarget};

/// What a dispatch run started, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub count: usize,
    pub targets: Vec<WatchTarget>,
}

pub struct Dispatch {
    pub summary: DispatchSummary,
    pub handles: Vec<WatchHandle<WatchReport>>,
}

/// Linked board items whose issue key and name are both allow-listed.
pub fn eligible_targets(
    ctx: &SyncContext,
    board_id: &str,
    items: &[LinkedItem],
) -> Vec<WatchTarget> {
    items
        .iter()
        .filter_map(|linked| {
            let Some(key) = parse_linked_key(&linked.link_text) else {
                debug!(item = %linked.item.name, "No issue key in link column");
                return None;
            };
            if !ctx.allow_list.is_eligible(&key, &linked.item.name) {
                debug!(issue = %key, item = %linked.item.name, "Outside allow-list; not watching");
                return None;
            }
            Some(WatchTarget::new(key, board_id, &linked.item))
        })
        .collect()
}

/// Starts one watcher per eligible linked item on `board_id`.
///
/// A failed board listing is returned as an error and nothing is started.
pub async fn start_watchers(ctx: &SyncContext, board_id: &str) -> SyncResult<Dispatch> {
    let items = ctx.board.list_linked_items(board_id).await?;
    let targets = eligible_targets(ctx, board_id, &items);

    let handles: Vec<_> = targets
        .iter()
        .cloned()
        .map(|target| watch::spawn(ctx.clone(), target))
        .collect();

    info!(
        board = board_id,
        source = ctx.board.name(),
        linked = items.len(),
        started = handles.len(),
        "Started watchers"
    );

    Ok(Dispatch {
        summary: DispatchSummary {
            count: handles.len(),
            targets,
        },
        handles,
    })
}

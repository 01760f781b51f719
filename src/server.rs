//! HTTP entry points for starting watchers.
//!
//! - `GET|POST /watch/{key}` starts the status watcher for one issue.
//! - `GET /subtasks/{key}` returns the sub-task keys of one issue.
//! - `POST /watchers` runs the dispatcher for the configured board.
//! - `GET /watchers` lists watchers started by this process.
//!
//! Watcher routes acknowledge immediately; outcomes only show up in the logs.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::sync::dispatch::{start_watchers, DispatchSummary};
use crate::sync::policy::FixedInterval;
use crate::sync::watch::{spawn_status_watch, WatchRegistry, WatchSummary};
use crate::sync::SyncContext;

pub struct AppState {
    pub ctx: SyncContext,
    pub board_id: String,
    pub status_interval: Duration,
    pub registry: WatchRegistry,
}

impl AppState {
    pub fn new(ctx: SyncContext, board_id: String, status_interval: Duration) -> Self {
        Self {
            ctx,
            board_id,
            status_interval,
            registry: WatchRegistry::new(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/watch/{key}", get(watch_issue_handler).post(watch_issue_handler))
        .route("/subtasks/{key}", get(subtasks_handler))
        .route("/watchers", post(start_watchers_handler).get(list_watchers_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn watch_issue_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Json<Value> {
    let handle = spawn_status_watch(
        state.ctx.issues.clone(),
        key.clone(),
        Arc::new(FixedInterval::new(state.status_interval)),
        state.ctx.activity.clone(),
    );
    state.registry.register(&handle);
    info!(issue = %key, "Started status watcher");
    Json(json!({ "message": format!("Started watching issue {key} in the background.") }))
}

async fn subtasks_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Vec<String>>, (StatusCode, Json<Value>)> {
    match state.ctx.issues.fetch_issue(&key).await {
        Ok(snapshot) => Ok(Json(snapshot.subtasks)),
        Err(e) => {
            let status = match &e {
                SyncError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                SyncError::Upstream { status, .. } => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            warn!(issue = %key, error = %e, "Sub-task lookup failed");
            Err((status, Json(json!({ "error": e.to_string() }))))
        }
    }
}

async fn start_watchers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DispatchSummary>, (StatusCode, Json<Value>)> {
    match start_watchers(&state.ctx, &state.board_id).await {
        Ok(dispatch) => {
            for handle in &dispatch.handles {
                state.registry.register(handle);
            }
            Ok(Json(dispatch.summary))
        }
        Err(e) => {
            warn!(board = %state.board_id, error = %e, "Dispatch failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

async fn list_watchers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<WatchSummary>> {
    Json(state.registry.list())
}

/// Serves until Ctrl-C, then cancels every running watcher.
pub async fn serve(state: Arc<AppState>, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "Listening");

    let app = build_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    state.registry.cancel_all();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::StatusCategory;
    use crate::providers::tests::{issue, linked, MockBoard, ScriptedIssues, Step};
    use crate::sync::allow_list::AllowList;
    use crate::sync::policy::Bounded;

    async fn start(board: MockBoard) -> String {
        let issues = ScriptedIssues::new()
            .script("KT-1", vec![Step::Snap(issue("KT-1", "To Do", Some(StatusCategory::Todo), &[]))])
            .script(
                "COXDP-6",
                vec![Step::Snap(issue("COXDP-6", "In Progress", None, &["COXDP-7", "COXDP-8"]))],
            )
            .script("KT-401", vec![Step::Unauthorized]);
        let ctx = SyncContext::new(
            Arc::new(issues),
            Arc::new(board),
            AllowList::new(["KT-1"], ["Test Project 1"]),
        )
        .with_policy(Arc::new(Bounded::immediate(1)));
        let state = Arc::new(AppState::new(ctx, "9244201387".into(), Duration::from_secs(3600)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn health_is_ok() {
        let base = start(MockBoard::new(vec![])).await;
        let body = reqwest::get(format!("{base}/health")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn watch_issue_acknowledges_immediately() {
        let base = start(MockBoard::new(vec![])).await;
        let client = reqwest::Client::new();
        let body: Value = client
            .post(format!("{base}/watch/KT-1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["message"], "Started watching issue KT-1 in the background.");

        let listed: Value = client
            .get(format!("{base}/watchers"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed[0]["issue_key"], "KT-1");
    }

    #[tokio::test]
    async fn watch_issue_accepts_get() {
        let base = start(MockBoard::new(vec![])).await;
        let resp = reqwest::get(format!("{base}/watch/KT-1")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Started watching issue KT-1 in the background.");
    }

    #[tokio::test]
    async fn subtasks_lists_child_keys() {
        let base = start(MockBoard::new(vec![])).await;
        let keys: Vec<String> = reqwest::get(format!("{base}/subtasks/COXDP-6"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(keys, vec!["COXDP-7", "COXDP-8"]);

        let none: Vec<String> = reqwest::get(format!("{base}/subtasks/KT-1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn subtasks_passes_through_tracker_errors() {
        let base = start(MockBoard::new(vec![])).await;

        let resp = reqwest::get(format!("{base}/subtasks/KT-404")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("404"));

        let resp = reqwest::get(format!("{base}/subtasks/KT-401")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn start_watchers_returns_count_and_targets() {
        let board = MockBoard::new(vec![
            linked("1", "Test Project 1", "KT-1 - https://x/browse/KT-1"),
            linked("2", "Unlisted Project", "KT-1"),
        ]);
        let base = start(board).await;
        let body: Value = reqwest::Client::new()
            .post(format!("{base}/watchers"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["targets"][0]["item_id"], "1");
        assert_eq!(body["targets"][0]["issue_key"], "KT-1");
    }

    #[tokio::test]
    async fn listing_failure_is_bad_gateway() {
        let base = start(MockBoard::new(vec![]).with_list_failure()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/watchers"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    }
}

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use super::completion::is_fully_done;
use super::log::ActivityLog;
use super::policy::{NextPoll, PollPolicy, UnauthorizedPolicy};
use super::SyncContext;
use crate::error::SyncResult;
use crate::model::board::{WatchTarget, WriteOutcome};
use crate::model::issue::IssueSnapshot;
use crate::providers::IssueSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Polling,
    Writing,
    Done,
    Failed,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchState::Done | WatchState::Failed)
    }
}

/// How a watcher that reached `Writing` finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Written,
    WriteFailed(String),
    /// The pair was no longer allow-listed when the write was due.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct WatchReport {
    pub target: WatchTarget,
    pub state: WatchState,
    pub polls: u32,
    pub completion: Option<Completion>,
    pub error: Option<String>,
}

/// Reconciles one issue against one board item until the issue tree is done.
pub struct WatchLoop {
    ctx: SyncContext,
    target: WatchTarget,
    state: WatchState,
    polls: u32,
    last_status: Option<String>,
    completion: Option<Completion>,
    error: Option<String>,
}

impl WatchLoop {
    pub fn new(ctx: SyncContext, target: WatchTarget) -> Self {
        Self {
            ctx,
            target,
            state: WatchState::Polling,
            polls: 0,
            last_status: None,
            completion: None,
            error: None,
        }
    }

    pub async fn run(mut self) -> WatchReport {
        info!(
            issue = %self.target.issue_key,
            item = %self.target.item_name,
            source = self.ctx.issues.name(),
            "Watching issue for completion"
        );
        self.ctx.activity.record(&self.target, "started", None);

        while !self.state.is_terminal() {
            self.state = match self.state {
                WatchState::Polling => self.poll().await,
                WatchState::Writing => self.write().await,
                terminal => terminal,
            };
        }

        WatchReport {
            target: self.target,
            state: self.state,
            polls: self.polls,
            completion: self.completion,
            error: self.error,
        }
    }

    async fn poll(&mut self) -> WatchState {
        self.polls += 1;
        match self.evaluate().await {
            Ok(true) => {
                info!(issue = %self.target.issue_key, "Issue and all sub-tasks are done");
                return WatchState::Writing;
            }
            Ok(false) => {
                debug!(issue = %self.target.issue_key, poll = self.polls, "Not done yet");
            }
            Err(e) if e.is_unauthorized() && self.ctx.on_unauthorized == UnauthorizedPolicy::Fail => {
                error!(issue = %self.target.issue_key, error = %e, "Stopping watcher: credential rejected");
                return self.fail(e.to_string());
            }
            Err(e) => {
                warn!(issue = %self.target.issue_key, error = %e, "Poll failed; will retry");
                self.ctx
                    .activity
                    .record(&self.target, "poll_failed", Some(&e.to_string()));
            }
        }

        match self.ctx.policy.wait(self.polls).await {
            NextPoll::Continue => WatchState::Polling,
            NextPoll::GiveUp => self.fail(format!("gave up after {} polls", self.polls)),
        }
    }

    async fn evaluate(&mut self) -> SyncResult<bool> {
        let root = self.ctx.issues.fetch_issue(&self.target.issue_key).await?;
        self.note_status(&root);
        is_fully_done(&root, self.ctx.issues.as_ref()).await
    }

    fn note_status(&mut self, root: &IssueSnapshot) {
        let current = root.status_label().to_string();
        match &self.last_status {
            Some(last) if *last != current => {
                info!(
                    issue = %self.target.issue_key,
                    from = %last,
                    to = %current,
                    "Status changed"
                );
                self.ctx.activity.record(
                    &self.target,
                    "status_changed",
                    Some(&format!("'{last}' -> '{current}'")),
                );
            }
            Some(_) => {}
            None => info!(issue = %self.target.issue_key, status = %current, "Initial status"),
        }
        self.last_status = Some(current);
    }

    async fn write(&mut self) -> WatchState {
        let target = &self.target;
        if !self.ctx.allow_list.is_eligible(&target.issue_key, &target.item_name) {
            info!(
                issue = %target.issue_key,
                item = %target.item_name,
                "Skipped: outside allow-list"
            );
            self.ctx.activity.record(target, "skipped", Some("outside allow-list"));
            self.completion = Some(Completion::Skipped);
            return WatchState::Done;
        }

        let result = self
            .ctx
            .board
            .set_item_status(&target.item_id, &target.board_id, &self.ctx.status_label)
            .await;

        let completion = match result {
            Ok(WriteOutcome::Applied {
                item_name,
                status_text,
            }) => {
                info!(
                    item = %item_name,
                    item_id = %target.item_id,
                    status = status_text.as_deref().unwrap_or(&self.ctx.status_label),
                    "Updated board item"
                );
                self.ctx
                    .activity
                    .record(target, "written", Some(&self.ctx.status_label));
                Completion::Written
            }
            Ok(WriteOutcome::Rejected(errors)) => {
                let message = errors.join("; ");
                warn!(item = %target.item_name, error = %message, "Board rejected status update");
                self.ctx.activity.record(target, "write_failed", Some(&message));
                Completion::WriteFailed(message)
            }
            Err(e) => {
                warn!(item = %target.item_name, error = %e, "Board status update failed");
                self.ctx
                    .activity
                    .record(target, "write_failed", Some(&e.to_string()));
                Completion::WriteFailed(e.to_string())
            }
        };
        self.completion = Some(completion);
        WatchState::Done
    }

    fn fail(&mut self, message: String) -> WatchState {
        self.ctx.activity.record(&self.target, "failed", Some(&message));
        self.error = Some(message);
        WatchState::Failed
    }
}

/// Handle to a spawned watcher. Dropping it leaves the task running.
pub struct WatchHandle<R> {
    issue_key: String,
    item_name: Option<String>,
    task: JoinHandle<R>,
}

impl<R> WatchHandle<R> {
    /// Stops the watcher at its next suspension point.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Waits for the watcher. `None` if it was cancelled or panicked.
    pub async fn join(&mut self) -> Option<R> {
        (&mut self.task).await.ok()
    }
}

pub fn spawn(ctx: SyncContext, target: WatchTarget) -> WatchHandle<WatchReport> {
    let issue_key = target.issue_key.clone();
    let item_name = Some(target.item_name.clone());
    let task = tokio::spawn(WatchLoop::new(ctx, target).run());
    WatchHandle {
        issue_key,
        item_name,
        task,
    }
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub issue_key: String,
    pub polls: u32,
    pub last_status: Option<String>,
    pub error: Option<String>,
}

/// Logs status changes of one issue. Stops on the first failed fetch or when
/// the policy gives up.
pub async fn watch_status(
    issues: Arc<dyn IssueSource>,
    issue_key: String,
    policy: Arc<dyn PollPolicy>,
    activity: ActivityLog,
) -> StatusReport {
    let mut report = StatusReport {
        issue_key: issue_key.clone(),
        polls: 0,
        last_status: None,
        error: None,
    };
    activity.record_issue(&issue_key, "started", None);

    match issues.fetch_issue(&issue_key).await {
        Ok(snapshot) => {
            report.polls = 1;
            info!(issue = %issue_key, status = %snapshot.status_label(), "Initial status");
            report.last_status = Some(snapshot.status_label().to_string());
        }
        Err(e) => {
            error!(issue = %issue_key, error = %e, "Could not fetch initial status");
            activity.record_issue(&issue_key, "failed", Some(&e.to_string()));
            report.error = Some(e.to_string());
            return report;
        }
    }

    loop {
        if policy.wait(report.polls).await == NextPoll::GiveUp {
            return report;
        }
        report.polls += 1;
        let snapshot = match issues.fetch_issue(&issue_key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(issue = %issue_key, error = %e, "Error while watching; stopping watcher");
                activity.record_issue(&issue_key, "failed", Some(&e.to_string()));
                report.error = Some(e.to_string());
                return report;
            }
        };

        let current = snapshot.status_label().to_string();
        let last = report.last_status.clone().unwrap_or_default();
        if current != last {
            info!(issue = %issue_key, from = %last, to = %current, "Status changed");
            activity.record_issue(
                &issue_key,
                "status_changed",
                Some(&format!("'{last}' -> '{current}'")),
            );
            report.last_status = Some(current);
        } else {
            debug!(issue = %issue_key, "Status unchanged");
        }
    }
}

pub fn spawn_status_watch(
    issues: Arc<dyn IssueSource>,
    issue_key: String,
    policy: Arc<dyn PollPolicy>,
    activity: ActivityLog,
) -> WatchHandle<StatusReport> {
    let task = tokio::spawn(watch_status(issues, issue_key.clone(), policy, activity));
    WatchHandle {
        issue_key,
        item_name: None,
        task,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchSummary {
    pub issue_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    pub finished: bool,
}

struct Registered {
    issue_key: String,
    item_name: Option<String>,
    abort: AbortHandle,
}

/// Running watchers, kept so they can be listed and cancelled on shutdown.
#[derive(Default)]
pub struct WatchRegistry {
    watches: Mutex<Vec<Registered>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R>(&self, handle: &WatchHandle<R>) {
        let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        watches.retain(|w| !w.abort.is_finished());
        watches.push(Registered {
            issue_key: handle.issue_key.clone(),
            item_name: handle.item_name.clone(),
            abort: handle.task.abort_handle(),
        });
    }

    pub fn list(&self) -> Vec<WatchSummary> {
        let watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        watches
            .iter()
            .map(|w| WatchSummary {
                issue_key: w.issue_key.clone(),
                item_name: w.item_name.clone(),
                finished: w.abort.is_finished(),
            })
            .collect()
    }

    /// Aborts every watcher still running. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        let mut cancelled = 0;
        for w in watches.drain(..) {
            if !w.abort.is_finished() {
                w.abort.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(cancelled, "Cancelled running watchers");
        }
        cancelled
    }
}

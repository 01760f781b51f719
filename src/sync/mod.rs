pub mod allow_list;
pub mod completion;
pub mod dispatch;
pub mod link;
pub mod log;
pub mod mark;
pub mod policy;
pub mod watch;

use std::sync::Arc;

use allow_list::AllowList;
use log::ActivityLog;
use policy::{FixedInterval, PollPolicy, UnauthorizedPolicy};

use crate::providers::{Board, IssueSource};

pub const DEFAULT_STATUS_LABEL: &str = "UP TO DATE";

/// Everything a watcher needs. Cloned into each spawned task; nothing in it is mutated.
#[derive(Clone)]
pub struct SyncContext {
    pub issues: Arc<dyn IssueSource>,
    pub board: Arc<dyn Board>,
    pub allow_list: Arc<AllowList>,
    pub policy: Arc<dyn PollPolicy>,
    pub activity: ActivityLog,
    pub status_label: String,
    pub on_unauthorized: UnauthorizedPolicy,
}

impl SyncContext {
    pub fn new(issues: Arc<dyn IssueSource>, board: Arc<dyn Board>, allow_list: AllowList) -> Self {
        Self {
            issues,
            board,
            allow_list: Arc::new(allow_list),
            policy: Arc::new(FixedInterval::default()),
            activity: ActivityLog::disabled(),
            status_label: DEFAULT_STATUS_LABEL.to_string(),
            on_unauthorized: UnauthorizedPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn PollPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_activity(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_status_label(mut self, label: impl Into<String>) -> Self {
        self.status_label = label.into();
        self
    }

    pub fn with_unauthorized_policy(mut self, policy: UnauthorizedPolicy) -> Self {
        self.on_unauthorized = policy;
        self
    }
}

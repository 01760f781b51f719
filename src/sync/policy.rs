use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPoll {
    Continue,
    GiveUp,
}

/// Decides how long a watcher waits between polls, and whether it keeps going.
#[async_trait]
pub trait PollPolicy: Send + Sync {
    /// Called after poll number `attempt` (1-based) did not finish the watch.
    async fn wait(&self, attempt: u32) -> NextPoll;
}

/// Sleeps a fixed interval and never gives up.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    pub interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[async_trait]
impl PollPolicy for FixedInterval {
    async fn wait(&self, _attempt: u32) -> NextPoll {
        tokio::time::sleep(self.interval).await;
        NextPoll::Continue
    }
}

/// Gives up once `max_polls` polls have run. A zero interval skips sleeping entirely.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    pub max_polls: u32,
    pub interval: Duration,
}

impl Bounded {
    pub fn new(max_polls: u32, interval: Duration) -> Self {
        Self {
            max_polls,
            interval,
        }
    }

    #[cfg(test)]
    pub fn immediate(max_polls: u32) -> Self {
        Self::new(max_polls, Duration::ZERO)
    }
}

#[async_trait]
impl PollPolicy for Bounded {
    async fn wait(&self, attempt: u32) -> NextPoll {
        if attempt >= self.max_polls {
            return NextPoll::GiveUp;
        }
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        NextPoll::Continue
    }
}

/// What a watcher does when the issue tracker rejects its credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnauthorizedPolicy {
    /// Treat it like any other failed poll and keep polling.
    #[default]
    Retry,
    /// End the watcher in the failed state.
    Fail,
}

//! Observability events
//!
//! The dispatcher and the follower tracker report what they did through a
//! bounded channel. Whoever holds the receiver (the daemon's log drain, a
//! metrics exporter, a test) turns these into counters and gauges.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

/// Events emitted by the background components
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A dispatcher scan cycle began
    ScanStarted {
        /// Decodable pending posts in the snapshot
        pending: usize,
        /// Posts whose publish time has passed
        due: usize,
    },

    /// One upload attempt failed
    PublishAttemptFailed {
        post_id: String,
        /// 1-based attempt number within the current visit
        attempt: u32,
        error: String,
    },

    /// The post is live and was removed from the schedule
    PostPublished {
        post_id: String,
        account: String,
        media_id: String,
    },

    /// The post disappeared before an attempt (removed by a user)
    PostCancelled { post_id: String },

    /// Every attempt of this visit failed; the post stays for the next cycle
    PostDeferred { post_id: String, attempts: u32 },

    /// The post cannot be attempted as configured (e.g. unknown account)
    PostAbandoned { post_id: String, reason: String },

    /// Platform-reported follower count
    FollowerCountObserved { account: String, count: u64 },

    /// The follower set was diffed against a fresh listing
    FollowersReconciled {
        account: String,
        count: u64,
        added: usize,
        unfollowed: Vec<String>,
    },

    /// A reconciliation cycle was aborted
    ReconcileFailed { account: String, error: String },

    /// A background loop exited
    Stopped {
        component: &'static str,
        reason: String,
    },
}

/// Sending half of the event channel
///
/// Cheap to clone; the dispatcher and the tracker usually share one sink.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<SchedulerEvent>>,
}

impl EventSink {
    /// Create a bounded event channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event without waiting
    ///
    /// When the channel is full the event is dropped with a warning, so a slow
    /// consumer never stalls publishing.
    pub fn emit(&self, event: SchedulerEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping event {:?}. Consider increasing event_channel_capacity.",
                    event
                );
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, discarding event");
            }
        }
    }
}

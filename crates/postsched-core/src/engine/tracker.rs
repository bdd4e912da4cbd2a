//! Follower tracker
//!
//! Keeps the set of known followers of one account and a log of the ones
//! that left.
//!
//! ## Reconciliation
//!
//! 1. Fetch the platform's follower count
//! 2. Same as last time: stop (no listing fetched)
//! 3. Otherwise page through the full listing into a temporary buffer
//! 4. Under the write lock: insert newcomers silently, move departures from
//!    the set to the unfollow log, store the new count
//!
//! A failure anywhere before step 4 leaves the state exactly as it was. The
//! count call and the whole listing each run under the fetch timeout.
//!
//! Only departures are logged. Growth shows up in the set and the count, not
//! as events of its own.

use futures::TryStreamExt;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, oneshot};
use tracing::{debug, error, info};

use super::events::{EventSink, SchedulerEvent};
use super::interval::run_every;
use crate::config::TrackerConfig;
use crate::error::{Error, Result};

/// Fetch deadline used by [`FollowerTracker::with_state`]
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);
use crate::traits::{FollowerListingProvider, follower_pages};

/// Known followers, unfollow log and last observed count
#[derive(Debug, Clone, Default)]
pub struct FollowerState {
    total_count: Option<u64>,
    followers: HashSet<String>,
    unfollows: Vec<String>,
}

/// What one diff changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowerDiff {
    /// Identifiers inserted into the set
    pub added: usize,
    /// Identifiers moved to the unfollow log, sorted
    pub unfollowed: Vec<String>,
}

impl FollowerState {
    /// Seed a state, e.g. from an earlier run
    pub fn new(
        followers: impl IntoIterator<Item = String>,
        total_count: Option<u64>,
    ) -> Self {
        Self {
            total_count,
            followers: followers.into_iter().collect(),
            unfollows: Vec::new(),
        }
    }

    /// Diff the set against a complete fresh listing
    ///
    /// This is the pure step of a reconciliation and applies regardless of
    /// whether the count changed. On an empty set (first run) everything is
    /// an addition and nothing is logged as an unfollow.
    pub fn apply_listing(
        &mut self,
        fresh: impl IntoIterator<Item = String>,
        fresh_count: u64,
    ) -> FollowerDiff {
        let fresh: HashSet<String> = fresh.into_iter().collect();

        let mut unfollowed: Vec<String> = self.followers.difference(&fresh).cloned().collect();
        unfollowed.sort();

        for id in &unfollowed {
            self.followers.remove(id);
        }
        self.unfollows.extend(unfollowed.iter().cloned());

        let before = self.followers.len();
        self.followers.extend(fresh);
        let added = self.followers.len() - before;

        self.total_count = Some(fresh_count);

        FollowerDiff { added, unfollowed }
    }

    /// Last observed platform count (`None` before the first reconciliation)
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Whether `id` is a known follower
    pub fn contains(&self, id: &str) -> bool {
        self.followers.contains(id)
    }

    /// Every departure so far, oldest first
    pub fn unfollows(&self) -> &[String] {
        &self.unfollows
    }

    /// Read-only copy for reporting
    pub fn snapshot(&self) -> FollowerSnapshot {
        let mut followers: Vec<String> = self.followers.iter().cloned().collect();
        followers.sort();

        FollowerSnapshot {
            total_count: self.total_count,
            followers,
            unfollows: self.unfollows.clone(),
        }
    }
}

/// Point-in-time follower report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerSnapshot {
    pub total_count: Option<u64>,
    /// Current followers, sorted
    pub followers: Vec<String>,
    /// Departures, oldest first
    pub unfollows: Vec<String>,
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Count unchanged, listing skipped
    Unchanged { count: u64 },
    /// Listing fetched and diffed
    Reconciled { count: u64, diff: FollowerDiff },
}

/// Periodic follower-set reconciler for one account
///
/// The set is written only by [`reconcile`](Self::reconcile); readers take
/// [`snapshot`](Self::snapshot) at any time.
pub struct FollowerTracker {
    source: Arc<dyn FollowerListingProvider>,
    account: String,
    interval: Duration,
    fetch_timeout: Duration,
    state: RwLock<FollowerState>,
    // Serializes reconciliations so there is a single writer
    reconciling: Mutex<()>,
    events: EventSink,
}

impl FollowerTracker {
    /// Create a tracker for the account named in `config`
    pub fn new(
        source: Arc<dyn FollowerListingProvider>,
        config: &TrackerConfig,
        events: EventSink,
    ) -> Result<Self> {
        config.validate()?;
        let account = config
            .account
            .clone()
            .ok_or_else(|| Error::config("Follower tracker requires an account"))?;

        Ok(
            Self::with_state(source, account, config.interval(), events, FollowerState::default())
                .with_fetch_timeout(config.fetch_timeout()),
        )
    }

    /// Create a tracker starting from a known state
    pub fn with_state(
        source: Arc<dyn FollowerListingProvider>,
        account: impl Into<String>,
        interval: Duration,
        events: EventSink,
        state: FollowerState,
    ) -> Self {
        Self {
            source,
            account: account.into(),
            interval,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            state: RwLock::new(state),
            reconciling: Mutex::new(()),
            events,
        }
    }

    /// Replace the deadline for the count call and for the full listing
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Observed account
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Bring the follower set up to date with the platform
    ///
    /// # Errors
    ///
    /// `Error::ListingProvider` (or `Error::Timeout`) when the count or any
    /// page cannot be fetched. The set, the log and the count are unchanged
    /// in that case.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let _writer = self.reconciling.lock().await;

        let count = tokio::time::timeout(self.fetch_timeout, self.source.total_count(&self.account))
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "Follower count of {} exceeded {:?}",
                    self.account, self.fetch_timeout
                ))
            })??;
        self.events.emit(SchedulerEvent::FollowerCountObserved {
            account: self.account.clone(),
            count,
        });

        if self.state.read().await.total_count == Some(count) {
            debug!("Follower count of {} unchanged at {}", self.account, count);
            return Ok(ReconcileOutcome::Unchanged { count });
        }

        // Fetch everything before touching the state
        let listing =
            follower_pages(self.source.as_ref(), &self.account).try_collect::<Vec<Vec<String>>>();
        let pages: Vec<Vec<String>> = tokio::time::timeout(self.fetch_timeout, listing)
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "Follower listing of {} exceeded {:?}",
                    self.account, self.fetch_timeout
                ))
            })??;
        let fresh = pages.into_iter().flatten();

        let diff = self.state.write().await.apply_listing(fresh, count);

        info!(
            "Reconciled followers of {}: count {}, {} new, {} unfollowed",
            self.account,
            count,
            diff.added,
            diff.unfollowed.len()
        );
        self.events.emit(SchedulerEvent::FollowersReconciled {
            account: self.account.clone(),
            count,
            added: diff.added,
            unfollowed: diff.unfollowed.clone(),
        });

        Ok(ReconcileOutcome::Reconciled { count, diff })
    }

    /// Read-only copy of the current state
    pub async fn snapshot(&self) -> FollowerSnapshot {
        self.state.read().await.snapshot()
    }

    /// Reconcile every `interval` until shutdown
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!(
            "Follower tracker started for {} (every {:?})",
            self.account, self.interval
        );

        run_every(self.interval, shutdown_rx, move || async move {
            if let Err(e) = self.reconcile().await {
                error!("Follower reconciliation for {} failed: {}", self.account, e);
                self.events.emit(SchedulerEvent::ReconcileFailed {
                    account: self.account.clone(),
                    error: e.to_string(),
                });
            }
        })
        .await;

        info!("Follower tracker stopped");
        self.events.emit(SchedulerEvent::Stopped {
            component: "tracker",
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Run until the process exits
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }
}

//! Caller-facing operations
//!
//! [`SchedulerService`] is what a request-handling layer talks to. It checks
//! submissions against the configured accounts and never publishes anything
//! itself; publishing belongs to the dispatcher.

use std::sync::Arc;
use tracing::info;

use crate::engine::{FollowerSnapshot, FollowerTracker};
use crate::error::{Error, Result};
use crate::post::{NewPost, PostSummary};
use crate::registry::AccountRegistry;
use crate::store::ScheduleStore;

/// Handle for submitting, listing and cancelling posts
#[derive(Clone)]
pub struct SchedulerService {
    store: ScheduleStore,
    accounts: Arc<AccountRegistry>,
    followers: Option<Arc<FollowerTracker>>,
}

impl SchedulerService {
    /// Create a service without follower reporting
    pub fn new(store: ScheduleStore, accounts: Arc<AccountRegistry>) -> Self {
        Self {
            store,
            accounts,
            followers: None,
        }
    }

    /// Expose a tracker's snapshots through [`followers`](Self::followers)
    pub fn with_followers(mut self, tracker: Arc<FollowerTracker>) -> Self {
        self.followers = Some(tracker);
        self
    }

    /// Schedule a post
    ///
    /// # Errors
    ///
    /// - `Error::Validation`: empty image or malformed account name
    /// - `Error::UnknownAccount`: the named account is not configured
    /// - `Error::StorageWrite`: nothing was scheduled
    pub async fn submit(&self, post: NewPost) -> Result<String> {
        post.validate()?;

        if !self.accounts.contains(&post.account) {
            return Err(Error::unknown_account(post.account));
        }

        let id = self.store.submit(post).await?;
        info!("Accepted post {}", id);
        Ok(id)
    }

    /// Cancel a pending post (no-op when absent)
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.remove(id).await
    }

    /// Pending posts without image bytes, earliest first
    pub async fn list(&self) -> Result<Vec<PostSummary>> {
        let mut summaries: Vec<PostSummary> = self
            .store
            .list_all()
            .await?
            .iter()
            .map(|record| record.summary())
            .collect();

        summaries.sort_by(|a, b| a.publish_at.cmp(&b.publish_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Image bytes of a pending post
    ///
    /// `Error::NotFound` when no such post is pending.
    pub async fn image(&self, id: &str) -> Result<Vec<u8>> {
        self.store.image(id).await
    }

    /// Current follower report
    pub async fn followers(&self) -> Result<FollowerSnapshot> {
        match &self.followers {
            Some(tracker) => Ok(tracker.snapshot().await),
            None => Err(Error::not_found("follower tracking is not enabled")),
        }
    }

    /// Configured account names
    pub fn accounts(&self) -> Vec<String> {
        self.accounts.list()
    }

    /// The underlying schedule
    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }
}

//! Minimal embedding example for postsched-core
//!
//! Runs the scheduler in-process with a memory store and stand-in providers.
//! The application drives the cycles itself instead of spawning the loops.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use postsched_core::engine::FollowerState;
use postsched_core::traits::FollowerPage;
use postsched_core::{
    AccountRegistry, DispatcherConfig, EventSink, FollowerListingProvider, FollowerTracker,
    MemoryKvStore, NewPost, PublishDispatcher, PublishedMedia, PublishingProvider, Result,
    ScheduleStore, SchedulerService, SystemClock,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{Level, info};

/// Publisher that prints instead of uploading
struct ConsolePublisher {
    name: &'static str,
    uploads: AtomicUsize,
}

impl ConsolePublisher {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            uploads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PublishingProvider for ConsolePublisher {
    async fn upload_photo(&self, payload: &[u8], caption: &str) -> Result<PublishedMedia> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "[{}] uploading {} bytes with caption '{}'",
            self.name,
            payload.len(),
            caption
        );
        Ok(PublishedMedia::new(format!("{}-{}", self.name, n)))
    }

    async fn set_location(&self, media: &PublishedMedia, location: &str) -> Result<()> {
        info!("[{}] media {} tagged at {}", self.name, media.id, location);
        Ok(())
    }

    fn supports_location(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "console"
    }
}

/// Follower source backed by a fixed list
struct StaticFollowers {
    ids: Vec<String>,
}

#[async_trait]
impl FollowerListingProvider for StaticFollowers {
    async fn total_count(&self, _account: &str) -> Result<u64> {
        Ok(self.ids.len() as u64)
    }

    async fn list_page(&self, _account: &str, _cursor: Option<&str>) -> Result<FollowerPage> {
        Ok(FollowerPage {
            ids: self.ids.clone(),
            next_cursor: None,
        })
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let store = ScheduleStore::new(Arc::new(MemoryKvStore::new()));
    let accounts = Arc::new(
        AccountRegistry::new(Arc::new(ConsolePublisher::new("default")))
            .with_account("acme", Arc::new(ConsolePublisher::new("acme"))),
    );

    let service = SchedulerService::new(store.clone(), accounts.clone());
    let now = Utc::now();

    let due = service
        .submit(NewPost {
            account: "acme".to_string(),
            caption: "launch day #acme".to_string(),
            location: "Lisbon".to_string(),
            publish_at: now - ChronoDuration::minutes(5),
            payload: vec![0xff, 0xd8, 0xff, 0xe0],
        })
        .await?;
    let later = service
        .submit(NewPost {
            account: String::new(),
            caption: "see you tomorrow".to_string(),
            location: String::new(),
            publish_at: now + ChronoDuration::days(1),
            payload: vec![0x89, 0x50, 0x4e, 0x47],
        })
        .await?;
    info!("Scheduled {} (due) and {} (tomorrow)", due, later);

    let (events, mut event_rx) = EventSink::channel(32);

    let dispatcher = PublishDispatcher::new(
        store,
        accounts,
        Arc::new(SystemClock),
        &DispatcherConfig::default(),
        events.clone(),
    )?;

    let report = dispatcher.run_cycle().await?;
    info!(
        "Cycle: {} pending, {} due, {} published",
        report.pending, report.due, report.published
    );

    for summary in service.list().await? {
        info!("Still scheduled: {} at {}", summary.id, summary.publish_at);
    }

    let tracker = FollowerTracker::with_state(
        Arc::new(StaticFollowers {
            ids: vec!["ana".to_string(), "bo".to_string()],
        }),
        "acme",
        Duration::from_secs(3600),
        events,
        FollowerState::default(),
    );
    tracker.reconcile().await?;
    info!("Followers: {:?}", tracker.snapshot().await.followers);

    drop(dispatcher);
    drop(tracker);
    while let Some(event) = event_rx.recv().await {
        info!("Event: {:?}", event);
    }

    Ok(())
}

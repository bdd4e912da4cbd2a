//! Test doubles and common utilities for contract tests
//!
//! These doubles record how they were called so the tests can check who did
//! what (how many uploads, how many pages) without any network or wall-clock
//! waiting.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use postsched_core::error::{Error, Result};
use postsched_core::traits::{
    FollowerListingProvider, FollowerPage, KvStore, PublishedMedia, PublishingProvider,
};
use postsched_core::{
    AccountRegistry, DispatcherConfig, EventSink, MemoryKvStore, NewPost, PublishDispatcher,
    ScheduleStore,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A clock that only moves when told to (or when something sleeps on it)
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// A fixed, arbitrary starting point
    pub fn at_epoch() -> Self {
        Self::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::from_std(by).unwrap();
    }

    /// Every delay requested so far
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl postsched_core::Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// What the scripted publisher does on a given call
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail,
    /// Never returns (exercises the dispatcher's timeout)
    Hang,
}

/// A publishing provider that follows a script, then repeats a fallback step
pub struct ScriptedPublisher {
    script: Arc<Mutex<VecDeque<Step>>>,
    fallback: Step,
    upload_calls: Arc<AtomicUsize>,
    location_calls: Arc<Mutex<Vec<(String, String)>>>,
    captions: Arc<Mutex<Vec<String>>>,
    supports_location: bool,
    pub name: &'static str,
}

impl ScriptedPublisher {
    pub fn new(name: &'static str, fallback: Step) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            upload_calls: Arc::new(AtomicUsize::new(0)),
            location_calls: Arc::new(Mutex::new(Vec::new())),
            captions: Arc::new(Mutex::new(Vec::new())),
            supports_location: true,
            name,
        }
    }

    pub fn always_succeeds() -> Self {
        Self::new("scripted", Step::Succeed)
    }

    pub fn always_fails() -> Self {
        Self::new("scripted", Step::Fail)
    }

    /// Run `steps` first, then fall back
    pub fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script.lock().unwrap().extend(steps);
        self
    }

    pub fn without_location_support(mut self) -> Self {
        self.supports_location = false;
        self
    }

    pub fn upload_call_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// `(media_id, location)` pairs passed to `set_location`
    pub fn location_calls(&self) -> Vec<(String, String)> {
        self.location_calls.lock().unwrap().clone()
    }

    pub fn captions(&self) -> Vec<String> {
        self.captions.lock().unwrap().clone()
    }

    /// Create a second handle observing the same counters
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            script: other.script.clone(),
            fallback: other.fallback.clone(),
            upload_calls: other.upload_calls.clone(),
            location_calls: other.location_calls.clone(),
            captions: other.captions.clone(),
            supports_location: other.supports_location,
            name: other.name,
        }
    }
}

#[async_trait]
impl PublishingProvider for ScriptedPublisher {
    async fn upload_photo(&self, _payload: &[u8], caption: &str) -> Result<PublishedMedia> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.captions.lock().unwrap().push(caption.to_string());

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Succeed => Ok(PublishedMedia::new(format!("media-{}", call))),
            Step::Fail => Err(Error::publish(self.name, "upstream unavailable")),
            Step::Hang => std::future::pending::<Result<PublishedMedia>>().await,
        }
    }

    async fn set_location(&self, media: &PublishedMedia, location: &str) -> Result<()> {
        self.location_calls
            .lock()
            .unwrap()
            .push((media.id.clone(), location.to_string()));
        Ok(())
    }

    fn supports_location(&self) -> bool {
        self.supports_location
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// A follower source backed by in-memory pages
pub struct MockFollowerSource {
    count: Arc<Mutex<u64>>,
    pages: Arc<Mutex<Vec<Vec<String>>>>,
    fail_listing_at: Arc<Mutex<Option<usize>>>,
    fail_count: Arc<AtomicBool>,
    hang_count: Arc<AtomicBool>,
    hang_listing: Arc<AtomicBool>,
    count_calls: Arc<AtomicUsize>,
    page_calls: Arc<AtomicUsize>,
}

impl MockFollowerSource {
    /// Followers split into pages; the reported count is set separately
    pub fn new(count: u64, pages: &[&[&str]]) -> Self {
        Self {
            count: Arc::new(Mutex::new(count)),
            pages: Arc::new(Mutex::new(to_pages(pages))),
            fail_listing_at: Arc::new(Mutex::new(None)),
            fail_count: Arc::new(AtomicBool::new(false)),
            hang_count: Arc::new(AtomicBool::new(false)),
            hang_listing: Arc::new(AtomicBool::new(false)),
            count_calls: Arc::new(AtomicUsize::new(0)),
            page_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, count: u64, pages: &[&[&str]]) {
        *self.count.lock().unwrap() = count;
        *self.pages.lock().unwrap() = to_pages(pages);
    }

    /// Fail the page with this index (0-based); `Some(0)` fails every listing
    pub fn fail_listing_at(&self, page: Option<usize>) {
        *self.fail_listing_at.lock().unwrap() = page;
    }

    pub fn fail_count(&self, fail: bool) {
        self.fail_count.store(fail, Ordering::SeqCst);
    }

    /// Make the count call never return
    pub fn hang_count(&self, hang: bool) {
        self.hang_count.store(hang, Ordering::SeqCst);
    }

    /// Make every page call never return
    pub fn hang_listing(&self, hang: bool) {
        self.hang_listing.store(hang, Ordering::SeqCst);
    }

    pub fn count_call_count(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn page_call_count(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            count: other.count.clone(),
            pages: other.pages.clone(),
            fail_listing_at: other.fail_listing_at.clone(),
            fail_count: other.fail_count.clone(),
            hang_count: other.hang_count.clone(),
            hang_listing: other.hang_listing.clone(),
            count_calls: other.count_calls.clone(),
            page_calls: other.page_calls.clone(),
        }
    }
}

fn to_pages(pages: &[&[&str]]) -> Vec<Vec<String>> {
    pages
        .iter()
        .map(|page| page.iter().map(|id| id.to_string()).collect())
        .collect()
}

#[async_trait]
impl FollowerListingProvider for MockFollowerSource {
    async fn total_count(&self, _account: &str) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_count.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(Error::listing("mock", "count unavailable"));
        }
        Ok(*self.count.lock().unwrap())
    }

    async fn list_page(&self, _account: &str, cursor: Option<&str>) -> Result<FollowerPage> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_listing.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let index: usize = match cursor {
            None => 0,
            Some(c) => c
                .parse()
                .map_err(|_| Error::listing("mock", format!("bad cursor {}", c)))?,
        };

        if *self.fail_listing_at.lock().unwrap() == Some(index) {
            return Err(Error::listing("mock", format!("page {} unavailable", index)));
        }

        let pages = self.pages.lock().unwrap();
        let ids = pages.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < pages.len()).then(|| (index + 1).to_string());

        Ok(FollowerPage { ids, next_cursor })
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}

/// A memory store whose existence checks can be made to fail
#[derive(Clone, Default)]
pub struct FlakyKvStore {
    inner: MemoryKvStore,
    fail_contains: Arc<AtomicBool>,
}

impl FlakyKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_contains(&self, fail: bool) {
        self.fail_contains.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        if self.fail_contains.load(Ordering::SeqCst) {
            return Err(Error::storage_read("backend unavailable"));
        }
        self.inner.contains(key).await
    }

    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.inner.scan().await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// A post for `account` that became due one hour before `now`
pub fn due_post(now: DateTime<Utc>, account: &str, payload: &[u8]) -> NewPost {
    NewPost {
        account: account.to_string(),
        caption: format!("caption for {}", String::from_utf8_lossy(payload)),
        location: String::new(),
        publish_at: now - ChronoDuration::hours(1),
        payload: payload.to_vec(),
    }
}

/// Fast dispatcher settings: 3 attempts, 5 minute cool-off
pub fn dispatcher_config() -> DispatcherConfig {
    DispatcherConfig {
        scan_interval_secs: 60,
        max_attempts: 3,
        retry_delay_secs: 300,
        publish_timeout_secs: 120,
        event_channel_capacity: 100,
    }
}

/// Everything a dispatcher test needs, wired together
pub struct Harness {
    pub store: ScheduleStore,
    pub backend: MemoryKvStore,
    pub clock: Arc<ManualClock>,
    pub accounts: Arc<AccountRegistry>,
}

impl Harness {
    /// Default account served by `publisher`
    pub fn new(publisher: ScriptedPublisher) -> Self {
        Self::with_accounts(AccountRegistry::new(Arc::new(publisher)))
    }

    pub fn with_accounts(accounts: AccountRegistry) -> Self {
        let backend = MemoryKvStore::new();
        Self {
            store: ScheduleStore::new(Arc::new(backend.clone())),
            backend,
            clock: Arc::new(ManualClock::at_epoch()),
            accounts: Arc::new(accounts),
        }
    }

    pub fn dispatcher(&self, events: EventSink) -> PublishDispatcher {
        PublishDispatcher::new(
            self.store.clone(),
            self.accounts.clone(),
            self.clock.clone(),
            &dispatcher_config(),
            events,
        )
        .expect("valid dispatcher config")
    }

    pub fn now(&self) -> DateTime<Utc> {
        postsched_core::Clock::now(self.clock.as_ref())
    }
}

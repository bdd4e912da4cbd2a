//! Publish dispatcher
//!
//! Periodically sweeps the schedule for due posts and pushes them through the
//! account's publishing provider.
//!
//! ## Per-record visit
//!
//! ```text
//!   Attempt(n) ──has(id)? no──────────────────────────────▶ Cancelled
//!       │ yes
//!       ├──resolve(account) fails─────────────────────────▶ Abandoned
//!       │
//!       ├──upload ok──▶ set location ──▶ remove(id) ──────▶ Published
//!       │
//!       └──upload fails──▶ n < max ? CoolOff(n) ──sleep──▶ Attempt(n+1)
//!                                  : ─────────────────────▶ Deferred
//! ```
//!
//! A deferred post is left untouched in the store. It is still due, so the
//! next scan cycle visits it again: delivery is at-least-once with unbounded
//! retries across cycles until it succeeds or is removed by hand.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::events::{EventSink, SchedulerEvent};
use super::interval::run_every;
use crate::clock::Clock;
use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::post::PostRecord;
use crate::registry::AccountRegistry;
use crate::store::ScheduleStore;
use crate::traits::{PublishedMedia, PublishingProvider};

/// How one visit to a due record ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    /// Published and removed from the schedule
    Published { media_id: String },
    /// Removed by someone else before an attempt
    Cancelled,
    /// Not attempted because of a configuration problem
    Abandoned { reason: String },
    /// Every attempt failed; the record waits for the next cycle
    Deferred { attempts: u32 },
}

/// Totals for one scan cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pending: usize,
    pub due: usize,
    pub published: usize,
    pub cancelled: usize,
    pub abandoned: usize,
    pub deferred: usize,
    /// Provider calls made across all records
    pub attempts: u32,
}

impl CycleReport {
    fn record(&mut self, outcome: &VisitOutcome) {
        match outcome {
            VisitOutcome::Published { .. } => self.published += 1,
            VisitOutcome::Cancelled => self.cancelled += 1,
            VisitOutcome::Abandoned { .. } => self.abandoned += 1,
            VisitOutcome::Deferred { .. } => self.deferred += 1,
        }
    }
}

/// Where a record stands within one visit
enum VisitState {
    Attempt { number: u32 },
    CoolOff { failed: u32 },
    Done(VisitOutcome),
}

/// Periodic due-post sweeper
///
/// ## Threading
///
/// A dispatcher processes records strictly one after another, so a record's
/// attempts never overlap with each other. Run exactly one dispatcher per
/// schedule.
pub struct PublishDispatcher {
    store: ScheduleStore,
    accounts: Arc<AccountRegistry>,
    clock: Arc<dyn Clock>,
    scan_interval: Duration,
    max_attempts: u32,
    retry_delay: Duration,
    publish_timeout: Duration,
    events: EventSink,
}

impl PublishDispatcher {
    /// Create a dispatcher
    ///
    /// # Parameters
    ///
    /// - `store`: The schedule shared with the request path
    /// - `accounts`: Publishing identities
    /// - `clock`: Time source for due checks and cooling-off delays
    /// - `config`: Scan period, attempt bound, delays
    /// - `events`: Where to report outcomes
    pub fn new(
        store: ScheduleStore,
        accounts: Arc<AccountRegistry>,
        clock: Arc<dyn Clock>,
        config: &DispatcherConfig,
        events: EventSink,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store,
            accounts,
            clock,
            scan_interval: config.scan_interval(),
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
            publish_timeout: config.publish_timeout(),
            events,
        })
    }

    /// Run one scan cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The sweep finished (individual publish failures are
    ///   counted, not returned)
    /// - `Err(Error)`: The schedule could not be read at all
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let now = self.clock.now();
        let records = self.store.list_all().await?;
        let pending = records.len();

        // Future posts are never handed to a provider
        let due: Vec<PostRecord> = records.into_iter().filter(|r| r.is_due(now)).collect();

        debug!("Scan at {}: {} pending, {} due", now, pending, due.len());
        self.events.emit(SchedulerEvent::ScanStarted {
            pending,
            due: due.len(),
        });

        let mut report = CycleReport {
            pending,
            due: due.len(),
            ..CycleReport::default()
        };

        for record in &due {
            let (outcome, attempts) = self.visit(record).await;
            report.attempts += attempts;
            report.record(&outcome);
        }

        if report.due > 0 {
            info!(
                "Scan finished: {} published, {} deferred, {} cancelled, {} abandoned",
                report.published, report.deferred, report.cancelled, report.abandoned
            );
        }

        Ok(report)
    }

    /// Drive one due record until it is published, cancelled, abandoned or
    /// out of attempts for this cycle
    ///
    /// Returns the outcome and the number of provider calls made.
    async fn visit(&self, record: &PostRecord) -> (VisitOutcome, u32) {
        let mut state = VisitState::Attempt { number: 1 };
        let mut calls = 0;

        loop {
            state = match state {
                VisitState::Attempt { number } => {
                    let (next, called) = self.attempt(record, number).await;
                    if called {
                        calls += 1;
                    }
                    next
                }
                VisitState::CoolOff { failed } => {
                    debug!(
                        "Cooling off {:?} before attempt {} on post {}",
                        self.retry_delay,
                        failed + 1,
                        record.id()
                    );
                    self.clock.sleep(self.retry_delay).await;
                    VisitState::Attempt { number: failed + 1 }
                }
                VisitState::Done(outcome) => return (outcome, calls),
            };
        }
    }

    /// One attempt; the flag says whether the provider was called
    async fn attempt(&self, record: &PostRecord, number: u32) -> (VisitState, bool) {
        let id = record.id();

        match self.store.has(id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Post {} was removed before attempt {}", id, number);
                self.events.emit(SchedulerEvent::PostCancelled {
                    post_id: id.to_string(),
                });
                return (VisitState::Done(VisitOutcome::Cancelled), false);
            }
            Err(e) => {
                // Treated like a failed attempt: the record is still there
                warn!("Could not check post {} before attempt {}: {}", id, number, e);
                return (self.after_failure(record, number, &e), false);
            }
        }

        let provider = match self.accounts.resolve(record.account()) {
            Ok(provider) => provider,
            Err(e) => {
                error!("Abandoning post {} for this cycle: {}", id, e);
                self.events.emit(SchedulerEvent::PostAbandoned {
                    post_id: id.to_string(),
                    reason: e.to_string(),
                });
                let outcome = VisitOutcome::Abandoned {
                    reason: e.to_string(),
                };
                return (VisitState::Done(outcome), false);
            }
        };

        match self.upload(provider.as_ref(), record).await {
            Ok(media) => {
                self.finish(provider.as_ref(), record, &media).await;
                let outcome = VisitOutcome::Published { media_id: media.id };
                (VisitState::Done(outcome), true)
            }
            Err(e) => {
                warn!(
                    "Publish attempt {}/{} failed for post {}: {}",
                    number, self.max_attempts, id, e
                );
                self.events.emit(SchedulerEvent::PublishAttemptFailed {
                    post_id: id.to_string(),
                    attempt: number,
                    error: e.to_string(),
                });
                (self.after_failure(record, number, &e), true)
            }
        }
    }

    fn after_failure(&self, record: &PostRecord, number: u32, error: &Error) -> VisitState {
        if number < self.max_attempts && error.is_retryable() {
            return VisitState::CoolOff { failed: number };
        }

        warn!(
            "Deferring post {} to the next scan after {} attempt(s)",
            record.id(),
            number
        );
        self.events.emit(SchedulerEvent::PostDeferred {
            post_id: record.id().to_string(),
            attempts: number,
        });
        VisitState::Done(VisitOutcome::Deferred { attempts: number })
    }

    async fn upload(
        &self,
        provider: &dyn PublishingProvider,
        record: &PostRecord,
    ) -> Result<PublishedMedia> {
        tokio::time::timeout(
            self.publish_timeout,
            provider.upload_photo(record.payload(), record.caption()),
        )
        .await
        .map_err(|_| {
            Error::timeout(format!(
                "{} upload exceeded {:?}",
                provider.provider_name(),
                self.publish_timeout
            ))
        })?
    }

    /// Post-publish bookkeeping
    ///
    /// The upload already happened, so nothing here may send the record back
    /// for another attempt.
    async fn finish(
        &self,
        provider: &dyn PublishingProvider,
        record: &PostRecord,
        media: &PublishedMedia,
    ) {
        let id = record.id();

        if provider.supports_location() && !record.location().is_empty() {
            let labelled = tokio::time::timeout(
                self.publish_timeout,
                provider.set_location(media, record.location()),
            )
            .await;

            match labelled {
                Ok(Ok(())) => debug!("Set location of media {}", media.id),
                Ok(Err(e)) => warn!("Post {} published but location failed: {}", id, e),
                Err(_) => warn!("Post {} published but location timed out", id),
            }
        }

        if let Err(e) = self.store.remove(id).await {
            // Left in place it would be published again next cycle
            error!("Post {} published as media {} but could not be removed: {}", id, media.id, e);
        }

        info!(
            "Published post {} for account '{}' as media {}",
            id,
            record.account(),
            media.id
        );
        self.events.emit(SchedulerEvent::PostPublished {
            post_id: id.to_string(),
            account: record.account().to_string(),
            media_id: media.id.clone(),
        });
    }

    /// Run scan cycles every `scan_interval` until shutdown
    ///
    /// The first cycle starts immediately. Cycle errors are logged; the loop
    /// keeps going.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!("Dispatcher started (scan every {:?})", self.scan_interval);

        run_every(self.scan_interval, shutdown_rx, move || async move {
            if let Err(e) = self.run_cycle().await {
                error!("Scan cycle failed: {}", e);
            }
        })
        .await;

        self.store.flush().await?;
        info!("Dispatcher stopped");
        self.events.emit(SchedulerEvent::Stopped {
            component: "dispatcher",
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Run until the process exits
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }
}

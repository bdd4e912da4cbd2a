//! Background components
//!
//! Two independent periodic loops share the process:
//!
//! ```text
//!                 ┌──────────────────┐
//!   run_every ───▶│ PublishDispatcher│──▶ ScheduleStore (list/has/remove)
//!   (1 min)       └──────────────────┘──▶ AccountRegistry ─▶ PublishingProvider
//!                          │
//!                          ▼
//!                    SchedulerEvent ──▶ EventSink ──▶ (log drain, metrics)
//!                          ▲
//!                 ┌──────────────────┐
//!   run_every ───▶│ FollowerTracker  │──▶ FollowerListingProvider
//!   (1 h)         └──────────────────┘
//! ```
//!
//! Neither loop blocks the other or the request path. Both stop between
//! cycles when their shutdown receiver fires.

pub mod dispatcher;
pub mod events;
pub mod interval;
pub mod tracker;

pub use dispatcher::{CycleReport, PublishDispatcher, VisitOutcome};
pub use events::{EventSink, SchedulerEvent};
pub use interval::run_every;
pub use tracker::{FollowerDiff, FollowerSnapshot, FollowerState, FollowerTracker, ReconcileOutcome};

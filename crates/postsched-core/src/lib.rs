// # postsched-core
//
// Core library for scheduled publishing and follower tracking.
//
// ## Architecture Overview
//
// - **KvStore**: Trait for the durable byte store holding pending posts
// - **ScheduleStore**: Content-addressed CRUD over post records
// - **PublishingProvider**: Trait for uploading a photo as one account
// - **PublishDispatcher**: Periodic sweep that publishes due posts with
//   bounded per-cycle retries and unbounded retry across cycles
// - **FollowerListingProvider**: Trait for follower count and paginated listing
// - **FollowerTracker**: Periodic follower-set diff with an unfollow log
// - **SchedulerService**: Operations exposed to a request-handling layer
// - **ProviderRegistry**: Plugin-based construction from configuration
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Explicit Ownership**: Every shared component is injected by handle, no globals
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Content addressing makes resubmission safe

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod post;
pub mod registry;
pub mod service;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, SystemClock};
pub use config::{
    AccountConfig, DispatcherConfig, ProviderConfig, SchedulerConfig, StoreConfig, TrackerConfig,
};
pub use engine::{
    EventSink, FollowerSnapshot, FollowerTracker, PublishDispatcher, SchedulerEvent,
};
pub use error::{Error, Result};
pub use post::{NewPost, PostRecord, PostSummary};
pub use registry::{AccountRegistry, ProviderRegistry};
pub use service::SchedulerService;
pub use store::{FileKvStore, MemoryKvStore, ScheduleStore};
pub use traits::{FollowerListingProvider, KvStore, PublishedMedia, PublishingProvider};

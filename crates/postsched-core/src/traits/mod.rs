//! Core traits for the post scheduler
//!
//! This module defines the collaborator seams every implementation plugs into.
//!
//! - [`KvStore`]: Durable byte storage underneath the schedule
//! - [`PublishingProvider`]: Upload a photo post for one account
//! - [`FollowerListingProvider`]: Follower count and paginated follower list

pub mod follower_source;
pub mod kv_store;
pub mod publisher;

pub use follower_source::{
    FollowerListingProvider, FollowerListingProviderFactory, FollowerPage, follower_pages,
};
pub use kv_store::{KvStore, KvStoreFactory};
pub use publisher::{PublishedMedia, PublishingProvider, PublishingProviderFactory};

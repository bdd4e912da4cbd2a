// # Publishing Provider Trait
//
// Defines the interface for pushing a photo to the social platform on behalf
// of one account.
//
// ## Implementations
//
// - HTTP gateway: `postsched-provider-http` crate
// - Tests: scripted in-process providers
//
// ## Usage
//
// ```rust,ignore
// use postsched_core::PublishingProvider;
//
// let media = provider.upload_photo(&image_bytes, "caption #tag").await?;
// if provider.supports_location() {
//     provider.set_location(&media, "Lisbon").await?;
// }
// ```

use async_trait::async_trait;

/// Handle to a post that now exists on the remote platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMedia {
    /// Platform-assigned media identifier
    pub id: String,
    /// Optional short code / permalink fragment
    pub code: Option<String>,
}

impl PublishedMedia {
    /// Create a handle from a platform media ID
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: None,
        }
    }
}

/// Trait for publishing provider implementations
///
/// One provider instance is bound to one authenticated account. The
/// [`crate::AccountRegistry`] maps account names to providers.
///
/// # Trust Level: Untrusted
///
/// Providers execute exactly one remote operation per call and report the
/// outcome. Retries, cooling-off delays and removal from the schedule are
/// owned by [`crate::PublishDispatcher`]; a provider that sleeps or loops
/// internally would break the per-visit attempt bound.
#[async_trait]
pub trait PublishingProvider: Send + Sync {
    /// Upload `payload` as a photo post with `caption`
    ///
    /// # Returns
    ///
    /// - `Ok(PublishedMedia)`: The post is live
    /// - `Err(Error::PublishProvider)`: The upload failed (the dispatcher retries)
    async fn upload_photo(
        &self,
        payload: &[u8],
        caption: &str,
    ) -> Result<PublishedMedia, crate::Error>;

    /// Apply a free-text location label to an already published post
    ///
    /// Only called when [`supports_location`](Self::supports_location) is true.
    async fn set_location(
        &self,
        _media: &PublishedMedia,
        _location: &str,
    ) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Whether this provider can label a post's location after upload
    fn supports_location(&self) -> bool {
        false
    }

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing publishing providers from configuration
pub trait PublishingProviderFactory: Send + Sync {
    /// Create a provider acting as `account`
    ///
    /// # Parameters
    ///
    /// - `config`: Provider configuration
    /// - `account`: The account name the provider publishes as (empty = default)
    /// - `access_token`: Per-account credential override, if any
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        account: &str,
        access_token: Option<&str>,
    ) -> Result<Box<dyn PublishingProvider>, crate::Error>;
}

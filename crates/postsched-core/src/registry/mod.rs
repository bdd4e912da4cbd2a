//! Plugin-based provider registry
//!
//! The registry allows publishing providers, follower listing sources and
//! durable stores to be registered dynamically at runtime, avoiding hardcoded
//! if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use postsched_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_builtin_stores();
//!
//! // Provider crates register themselves
//! postsched_provider_http::register(&registry);
//!
//! let provider = registry.create_publisher(&config.provider, "", None)?;
//! let store = registry.create_store(&config.store).await?;
//! ```

pub mod accounts;

pub use accounts::AccountRegistry;

use crate::config::{ProviderConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileKvStoreFactory, MemoryKvStoreFactory};
use crate::traits::{FollowerListingProvider, KvStore, PublishingProvider};
use crate::traits::{FollowerListingProviderFactory, KvStoreFactory, PublishingProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry for plugin-based provider and store creation
///
/// The registry maintains maps of type names to factory objects, allowing
/// dynamic instantiation based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered publishing provider factories
    publishers: RwLock<HashMap<String, Box<dyn PublishingProviderFactory>>>,

    /// Registered follower listing factories
    listing_sources: RwLock<HashMap<String, Box<dyn FollowerListingProviderFactory>>>,

    /// Registered key-value store factories
    stores: RwLock<HashMap<String, Arc<dyn KvStoreFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `file` and `memory` stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("file", Box::new(FileKvStoreFactory));
        registry.register_store("memory", Box::new(MemoryKvStoreFactory));
        registry
    }

    /// Register a publishing provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "http")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_publisher(
        &self,
        name: impl Into<String>,
        factory: Box<dyn PublishingProviderFactory>,
    ) {
        let mut publishers = self.publishers.write().unwrap_or_else(PoisonError::into_inner);
        publishers.insert(name.into(), factory);
    }

    /// Register a follower listing factory
    pub fn register_listing_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn FollowerListingProviderFactory>,
    ) {
        let mut sources = self
            .listing_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Register a key-value store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn KvStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create a publishing provider acting as `account`
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn PublishingProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If provider type is not registered or creation fails
    pub fn create_publisher(
        &self,
        config: &ProviderConfig,
        account: &str,
        access_token: Option<&str>,
    ) -> Result<Box<dyn PublishingProvider>> {
        let provider_type = config.type_name();
        let publishers = self.publishers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = publishers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config, account, access_token)
    }

    /// Create a follower listing source from configuration
    pub fn create_listing_source(
        &self,
        config: &ProviderConfig,
    ) -> Result<Box<dyn FollowerListingProvider>> {
        let source_type = config.type_name();
        let sources = self
            .listing_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = sources.get(source_type).ok_or_else(|| {
            Error::config(format!("Unknown listing source type: {}", source_type))
        })?;

        factory.create(config)
    }

    /// Create a key-value store from configuration
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn KvStore>> {
        let store_type = config.type_name();

        // Clone the factory out so the lock is not held across the await
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
                .clone()
        };

        let config_json = match config {
            StoreConfig::Custom { config, .. } => config.clone(),
            other => serde_json::to_value(other)?,
        };

        factory.create(&config_json).await
    }

    /// List all registered publishing provider types
    pub fn list_publishers(&self) -> Vec<String> {
        let publishers = self.publishers.read().unwrap_or_else(PoisonError::into_inner);
        publishers.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a publishing provider type is registered
    pub fn has_publisher(&self, name: &str) -> bool {
        let publishers = self.publishers.read().unwrap_or_else(PoisonError::into_inner);
        publishers.contains_key(name)
    }

    /// Check if a follower listing type is registered
    pub fn has_listing_source(&self, name: &str) -> bool {
        let sources = self
            .listing_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PublishedMedia;
    use async_trait::async_trait;

    struct NamedProvider(String);

    #[async_trait]
    impl PublishingProvider for NamedProvider {
        async fn upload_photo(&self, _payload: &[u8], _caption: &str) -> Result<PublishedMedia> {
            Ok(PublishedMedia::new(self.0.clone()))
        }

        fn provider_name(&self) -> &'static str {
            "named"
        }
    }

    struct NamedFactory;

    impl PublishingProviderFactory for NamedFactory {
        fn create(
            &self,
            _config: &ProviderConfig,
            account: &str,
            _access_token: Option<&str>,
        ) -> Result<Box<dyn PublishingProvider>> {
            Ok(Box::new(NamedProvider(account.to_string())))
        }
    }

    fn custom(factory: &str) -> ProviderConfig {
        ProviderConfig::Custom {
            factory: factory.to_string(),
            config: serde_json::json!({}),
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();

        // Initially empty
        assert!(!registry.has_publisher("named"));

        registry.register_publisher("named", Box::new(NamedFactory));

        assert!(registry.has_publisher("named"));
        assert!(registry.list_publishers().contains(&"named".to_string()));
    }

    #[tokio::test]
    async fn created_publisher_acts_as_requested_account() {
        let registry = ProviderRegistry::new();
        registry.register_publisher("named", Box::new(NamedFactory));

        let provider = registry.create_publisher(&custom("named"), "acme", None).unwrap();
        let media = provider.upload_photo(b"img", "").await.unwrap();
        assert_eq!(media.id, "acme");
    }

    #[test]
    fn unknown_types_are_config_errors() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.create_publisher(&custom("missing"), "", None),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            registry.create_listing_source(&custom("missing")),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn builtin_stores_are_available() {
        let registry = ProviderRegistry::with_builtin_stores();
        assert!(registry.has_store("file"));

        let store = registry.create_store(&StoreConfig::Memory).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }
}

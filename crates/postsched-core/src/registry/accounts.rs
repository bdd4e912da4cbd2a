//! Publishing identities
//!
//! Maps account names to the provider that publishes as that account. The
//! empty name always means the default account.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ProviderRegistry;
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::traits::PublishingProvider;

/// Account name to publishing provider lookup
///
/// Built once at startup and shared by handle; there is no global account map.
#[derive(Clone)]
pub struct AccountRegistry {
    default: Arc<dyn PublishingProvider>,
    named: BTreeMap<String, Arc<dyn PublishingProvider>>,
}

impl AccountRegistry {
    /// Create a registry with only the default account
    pub fn new(default: Arc<dyn PublishingProvider>) -> Self {
        Self {
            default,
            named: BTreeMap::new(),
        }
    }

    /// Add a named account
    pub fn with_account(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn PublishingProvider>,
    ) -> Self {
        self.named.insert(name.into(), provider);
        self
    }

    /// Build every configured account through the provider factories
    ///
    /// The default account uses the provider's own credential; named
    /// accounts may override it.
    pub fn from_config(registry: &ProviderRegistry, config: &SchedulerConfig) -> Result<Self> {
        let default = registry.create_publisher(&config.provider, "", None)?;
        let mut accounts = Self::new(Arc::from(default));

        for account in &config.accounts {
            let provider = registry.create_publisher(
                &config.provider,
                &account.name,
                account.access_token.as_deref(),
            )?;
            accounts = accounts.with_account(account.name.clone(), Arc::from(provider));
        }

        Ok(accounts)
    }

    /// Provider for `account`
    ///
    /// # Errors
    ///
    /// `Error::UnknownAccount` when a non-empty name has no provider.
    pub fn resolve(&self, account: &str) -> Result<Arc<dyn PublishingProvider>> {
        if account.is_empty() {
            return Ok(self.default.clone());
        }

        self.named
            .get(account)
            .cloned()
            .ok_or_else(|| Error::unknown_account(account))
    }

    /// Whether `account` resolves
    pub fn contains(&self, account: &str) -> bool {
        account.is_empty() || self.named.contains_key(account)
    }

    /// Names of the configured accounts, sorted (the default is not listed)
    pub fn list(&self) -> Vec<String> {
        self.named.keys().cloned().collect()
    }
}

impl std::fmt::Debug for AccountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRegistry")
            .field("default", &self.default.provider_name())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PublishedMedia;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl PublishingProvider for Fixed {
        async fn upload_photo(&self, _payload: &[u8], _caption: &str) -> Result<PublishedMedia> {
            Ok(PublishedMedia::new(self.0))
        }

        fn provider_name(&self) -> &'static str {
            self.0
        }
    }

    fn registry() -> AccountRegistry {
        AccountRegistry::new(Arc::new(Fixed("default")))
            .with_account("globex", Arc::new(Fixed("globex")))
            .with_account("acme", Arc::new(Fixed("acme")))
    }

    #[test]
    fn empty_name_resolves_to_default() {
        let accounts = registry();
        assert_eq!(accounts.resolve("").unwrap().provider_name(), "default");
        assert_eq!(accounts.resolve("acme").unwrap().provider_name(), "acme");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let accounts = registry();
        assert!(matches!(
            accounts.resolve("initech"),
            Err(Error::UnknownAccount(name)) if name == "initech"
        ));
        assert!(!accounts.contains("initech"));
        assert!(accounts.contains(""));
    }

    #[test]
    fn list_is_sorted() {
        assert_eq!(registry().list(), vec!["acme", "globex"]);
    }
}

//! Configuration types for the post scheduler
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main scheduler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Durable store holding pending posts
    #[serde(default)]
    pub store: StoreConfig,

    /// Platform provider used for publishing and follower listing
    pub provider: ProviderConfig,

    /// Named publishing identities in addition to the default one
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Publish dispatcher settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Follower tracker settings
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl SchedulerConfig {
    /// Create a configuration for `provider` with every other section defaulted
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.provider.validate()?;
        self.dispatcher.validate()?;
        self.tracker.validate()?;

        let mut seen = HashSet::new();
        for account in &self.accounts {
            account.validate()?;
            if !seen.insert(account.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Account '{}' is configured more than once",
                    account.name
                )));
            }
        }

        Ok(())
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file with atomic writes and backup recovery
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Platform provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// JSON gateway reached over HTTP
    Http {
        /// Gateway base URL (e.g., "https://graph.example.com/v1")
        base_url: String,
        /// Bearer token of the default account
        access_token: String,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Http {
                base_url,
                access_token,
            } => {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    return Err(crate::Error::config(format!(
                        "HTTP provider base URL must start with http:// or https://, got '{}'",
                        base_url
                    )));
                }
                if access_token.is_empty() {
                    return Err(crate::Error::config("HTTP provider access token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Http { .. } => "http",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Http {
            base_url: String::new(),
            access_token: String::new(),
        }
    }
}

/// A named publishing identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account name used by posts
    pub name: String,

    /// Credential for this account; falls back to the provider's token
    #[serde(default)]
    pub access_token: Option<String>,
}

impl AccountConfig {
    /// Create an account using the provider's default credential
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access_token: None,
        }
    }

    /// Set a per-account credential
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config(
                "Account name cannot be empty (the default account needs no entry)",
            ));
        }
        if self.name.trim() != self.name {
            return Err(crate::Error::config(format!(
                "Account name has surrounding whitespace: '{}'",
                self.name
            )));
        }
        if matches!(&self.access_token, Some(token) if token.is_empty()) {
            return Err(crate::Error::config(format!(
                "Access token for account '{}' cannot be empty",
                self.name
            )));
        }
        Ok(())
    }
}

/// Publish dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Period between scan cycles (in seconds)
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Upload attempts per record per scan-cycle visit
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Cooling-off delay between attempts on the same record (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Deadline for a single provider call (in seconds)
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DispatcherConfig {
    /// Validate the dispatcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.scan_interval_secs == 0 {
            return Err(crate::Error::config("Scan interval must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Max attempts must be >= 1"));
        }
        if self.publish_timeout_secs == 0 {
            return Err(crate::Error::config("Publish timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Scan period as a `Duration`
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Retry delay as a `Duration`
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Publish timeout as a `Duration`
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Follower tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Observed account; the tracker does not run without one
    #[serde(default)]
    pub account: Option<String>,

    /// Period between reconciliation cycles (in seconds)
    #[serde(default = "default_tracker_interval_secs")]
    pub interval_secs: u64,

    /// Deadline for the count call and for the whole listing (in seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl TrackerConfig {
    /// Validate the tracker configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Tracker interval must be > 0"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("Follower fetch timeout must be > 0"));
        }
        if matches!(&self.account, Some(account) if account.trim().is_empty()) {
            return Err(crate::Error::config("Tracked account cannot be blank"));
        }
        Ok(())
    }

    /// Reconciliation period as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Fetch deadline as a `Duration`
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            account: None,
            interval_secs: default_tracker_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_scan_interval_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    300
}

fn default_publish_timeout_secs() -> u64 {
    120
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_tracker_interval_secs() -> u64 {
    3600
}

fn default_fetch_timeout_secs() -> u64 {
    120
}

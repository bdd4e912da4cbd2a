// # HTTP Gateway Provider
//
// Publishing provider and follower listing source for a JSON gateway in
// front of the social platform.
//
// ## Behavior
//
// - One HTTP request per trait call
// - Every failure is returned to the caller as-is; the dispatcher and the
//   tracker own retries and scheduling
// - 30 second client timeout
// - Status codes are mapped to specific messages (401/403, 404, 429, 5xx)
//
// ## Trust Level: Untrusted
//
// **Forbidden** (enforced by code review):
// - Retry or backoff loops
// - Spawning tasks
// - Caching responses beyond a single request
// - Touching the schedule store
//
// ## Security Requirements
//
// - Access tokens NEVER appear in logs or `Debug` output
// - Image bytes are never logged
//
// ## API Reference
//
// - Upload: POST `/accounts/:account/media` `{"image": <base64>, "caption": ...}` → `{"id", "code"?}`
// - Location: POST `/media/:id/location` `{"location": ...}`
// - Follower count: GET `/accounts/:account/followers/count` → `{"count"}`
// - Follower page: GET `/accounts/:account/followers?cursor=...` → `{"ids", "next_cursor"?}`
//
// The default account (empty name) is addressed as `me`.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use postsched_core::config::ProviderConfig;
use postsched_core::traits::{
    FollowerListingProvider, FollowerListingProviderFactory, FollowerPage, PublishedMedia,
    PublishingProvider, PublishingProviderFactory,
};
use postsched_core::{Error, ProviderRegistry, Result};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider name used in errors and logs
const PROVIDER_NAME: &str = "http";

/// Path segment for the default account
const DEFAULT_ACCOUNT_SEGMENT: &str = "me";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct UploadRequest<'a> {
    image: String,
    caption: &'a str,
}

#[derive(Serialize)]
struct LocationRequest<'a> {
    location: &'a str,
}

#[derive(Deserialize)]
struct MediaResponse {
    id: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct FollowersResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Which capability a request belongs to, for error classification
#[derive(Clone, Copy)]
enum Capability {
    Publish,
    Listing,
}

impl Capability {
    fn error(self, message: String) -> Error {
        match self {
            Capability::Publish => Error::publish(PROVIDER_NAME, message),
            Capability::Listing => Error::listing(PROVIDER_NAME, message),
        }
    }
}

/// Gateway client acting as one account
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. The same client serves both capabilities; for
/// listing, the observed account is passed per call.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the access token.
pub struct HttpGraphClient {
    /// Gateway base URL
    base_url: Url,

    /// Bearer token
    /// ⚠️ NEVER log this value
    access_token: String,

    /// Account this client publishes as (empty = default)
    account: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for HttpGraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGraphClient")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &"<REDACTED>")
            .field("account", &self.account)
            .finish()
    }
}

impl HttpGraphClient {
    /// Create a client
    ///
    /// # Parameters
    ///
    /// - `base_url`: Gateway base URL (http or https)
    /// - `access_token`: Bearer token for `account`
    /// - `account`: Account to publish as (empty = default)
    ///
    /// # Errors
    ///
    /// `Error::Config` for an empty token or an unusable URL.
    pub fn new(
        base_url: &str,
        access_token: impl Into<String>,
        account: impl Into<String>,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(Error::config("HTTP provider access token cannot be empty"));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid gateway URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Gateway URL must be an http(s) base URL, got '{}'",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            access_token,
            account: account.into(),
            client,
        })
    }

    /// Account this client publishes as
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("Gateway URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn account_segment(account: &str) -> &str {
        if account.is_empty() {
            DEFAULT_ACCOUNT_SEGMENT
        } else {
            account
        }
    }

    /// Send a request and decode a successful JSON body
    async fn execute<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        capability: Capability,
        what: &str,
    ) -> Result<T> {
        let response = self.send(request, capability, what).await?;

        response.json::<T>().await.map_err(|e| {
            capability.error(format!("Failed to parse {} response: {}", what, e))
        })
    }

    /// Send a request and map transport errors and non-2xx statuses
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        capability: Capability,
        what: &str,
    ) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(format!("{} request timed out", what))
                } else {
                    capability.error(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(capability.error(Self::describe_status(status, what, &error_text)))
    }

    fn describe_status(status: StatusCode, what: &str, error_text: &str) -> String {
        match status.as_u16() {
            401 | 403 => format!(
                "Authentication failed: Invalid access token or insufficient permissions. Status: {}",
                status
            ),
            404 => format!("{} target not found. Status: {}", what, status),
            429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
            500..=599 => format!("Gateway server error (transient): {} - {}", status, error_text),
            _ => format!("{} failed: {} - {}", what, status, error_text),
        }
    }
}

#[async_trait]
impl PublishingProvider for HttpGraphClient {
    async fn upload_photo(&self, payload: &[u8], caption: &str) -> Result<PublishedMedia> {
        let url = self.endpoint(&["accounts", Self::account_segment(&self.account), "media"])?;
        tracing::debug!(
            "Uploading {} byte photo as '{}'",
            payload.len(),
            Self::account_segment(&self.account)
        );

        let body = UploadRequest {
            image: BASE64.encode(payload),
            caption,
        };

        let media: MediaResponse = self
            .execute(self.client.post(url).json(&body), Capability::Publish, "Upload")
            .await?;

        tracing::info!("Photo published as media {}", media.id);
        Ok(PublishedMedia {
            id: media.id,
            code: media.code,
        })
    }

    async fn set_location(&self, media: &PublishedMedia, location: &str) -> Result<()> {
        let url = self.endpoint(&["media", &media.id, "location"])?;
        let body = LocationRequest { location };

        self.send(self.client.post(url).json(&body), Capability::Publish, "Location update")
            .await?;

        tracing::debug!("Location of media {} set", media.id);
        Ok(())
    }

    fn supports_location(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl FollowerListingProvider for HttpGraphClient {
    async fn total_count(&self, account: &str) -> Result<u64> {
        let url = self.endpoint(&[
            "accounts",
            Self::account_segment(account),
            "followers",
            "count",
        ])?;

        let response: CountResponse = self
            .execute(self.client.get(url), Capability::Listing, "Follower count")
            .await?;
        Ok(response.count)
    }

    async fn list_page(&self, account: &str, cursor: Option<&str>) -> Result<FollowerPage> {
        let url = self.endpoint(&["accounts", Self::account_segment(account), "followers"])?;

        let mut request = self.client.get(url);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let page: FollowersResponse = self
            .execute(request, Capability::Listing, "Follower listing")
            .await?;

        tracing::trace!("Fetched {} follower ids", page.ids.len());
        Ok(FollowerPage {
            ids: page.ids,
            next_cursor: page.next_cursor,
        })
    }

    fn source_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating gateway clients
pub struct HttpProviderFactory;

impl HttpProviderFactory {
    fn build(config: &ProviderConfig, account: &str, token: Option<&str>) -> Result<HttpGraphClient> {
        match config {
            ProviderConfig::Http {
                base_url,
                access_token,
            } => HttpGraphClient::new(base_url, token.unwrap_or(access_token), account),
            _ => Err(Error::config("Invalid config for HTTP provider")),
        }
    }
}

impl PublishingProviderFactory for HttpProviderFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        account: &str,
        access_token: Option<&str>,
    ) -> Result<Box<dyn PublishingProvider>> {
        Ok(Box::new(Self::build(config, account, access_token)?))
    }
}

impl FollowerListingProviderFactory for HttpProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn FollowerListingProvider>> {
        Ok(Box::new(Self::build(config, "", None)?))
    }
}

/// Register the HTTP provider with a registry
///
/// # Example
///
/// ```rust
/// use postsched_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// postsched_provider_http::register(&registry);
/// assert!(registry.has_publisher("http"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_publisher("http", Box::new(HttpProviderFactory));
    registry.register_listing_source("http", Box::new(HttpProviderFactory));
}

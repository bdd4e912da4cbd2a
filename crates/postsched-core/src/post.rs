//! Content-addressed post records
//!
//! A [`PostRecord`] is one pending scheduled publication. Its ID is always
//! derived from the image bytes and the owning account, never supplied by a
//! caller: resubmitting the same image for the same account lands on the same
//! key and replaces the pending entry.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// A pending scheduled publication
///
/// Records are immutable once built. "Editing" a post means removing it and
/// submitting a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    id: String,
    account: String,
    caption: String,
    location: String,
    publish_at: DateTime<Utc>,
    payload: Vec<u8>,
}

/// Serialized form stored in the key-value store
#[derive(Debug, Serialize, Deserialize)]
struct StoredPost {
    id: String,
    #[serde(default)]
    account: String,
    #[serde(default)]
    caption: String,
    #[serde(default)]
    location: String,
    publish_at: DateTime<Utc>,
    payload: String,
}

impl PostRecord {
    /// Build a record and derive its content address
    ///
    /// # Parameters
    ///
    /// - `account`: Publishing identity; empty string means the default account
    /// - `caption`: Free text attached to the publication
    /// - `location`: Location label applied after a successful publish
    /// - `publish_at`: Earliest time dispatch may attempt publication
    /// - `payload`: Image bytes
    pub fn new(
        account: impl Into<String>,
        caption: impl Into<String>,
        location: impl Into<String>,
        publish_at: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Self {
        let account = account.into();
        let id = Self::content_address(&payload, &account);

        Self {
            id,
            account,
            caption: caption.into(),
            location: location.into(),
            publish_at,
            payload,
        }
    }

    /// Hex SHA-256 of `payload || account`
    ///
    /// Caption, location and publish time do not participate.
    pub fn content_address(payload: &[u8], account: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.update(account.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Content address of this record
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Publishing identity (empty = default account)
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Caption text
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Location label
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Earliest publication time
    pub fn publish_at(&self) -> DateTime<Utc> {
        self.publish_at
    }

    /// Image bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the record, keeping only the image bytes
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Whether dispatch may attempt this post at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.publish_at
    }

    /// Payload-free view for status listings
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id.clone(),
            account: self.account.clone(),
            caption: self.caption.clone(),
            location: self.location.clone(),
            publish_at: self.publish_at,
            publish_date: self.publish_at.to_rfc2822(),
            payload_len: self.payload.len(),
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        let stored = StoredPost {
            id: self.id.clone(),
            account: self.account.clone(),
            caption: self.caption.clone(),
            location: self.location.clone(),
            publish_at: self.publish_at,
            payload: BASE64.encode(&self.payload),
        };

        serde_json::to_vec(&stored)
            .map_err(|e| Error::storage_write(format!("Failed to serialize post {}: {}", self.id, e)))
    }

    /// Decode stored bytes, re-deriving the ID from content
    ///
    /// A stored ID that does not match the content is treated as corruption.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let stored: StoredPost = serde_json::from_slice(bytes)
            .map_err(|e| Error::deserialization(format!("Invalid post record: {}", e)))?;

        let payload = BASE64.decode(stored.payload.as_bytes()).map_err(|e| {
            Error::deserialization(format!("Invalid payload encoding in post {}: {}", stored.id, e))
        })?;

        let record = Self::new(
            stored.account,
            stored.caption,
            stored.location,
            stored.publish_at,
            payload,
        );

        if record.id != stored.id {
            return Err(Error::deserialization(format!(
                "Post {} does not match its content (expected {})",
                stored.id, record.id
            )));
        }

        Ok(record)
    }
}

/// Pending post as shown by status listings (no image bytes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    /// Content address
    pub id: String,
    /// Publishing identity (empty = default account)
    pub account: String,
    /// Caption text
    pub caption: String,
    /// Location label
    pub location: String,
    /// Earliest publication time
    pub publish_at: DateTime<Utc>,
    /// `publish_at` rendered as RFC 2822 for display
    pub publish_date: String,
    /// Size of the image payload in bytes
    pub payload_len: usize,
}

/// A submission request, before validation
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    /// Publishing identity (empty = default account)
    pub account: String,
    /// Caption text
    pub caption: String,
    /// Location label
    pub location: String,
    /// Earliest publication time
    pub publish_at: DateTime<Utc>,
    /// Image bytes
    pub payload: Vec<u8>,
}

impl NewPost {
    /// Check the fields that can be judged without any collaborator
    pub fn validate(&self) -> Result<()> {
        if self.payload.is_empty() {
            return Err(Error::validation("Image payload cannot be empty"));
        }

        if self.account.trim() != self.account {
            return Err(Error::validation(format!(
                "Account name has surrounding whitespace: '{}'",
                self.account
            )));
        }

        Ok(())
    }

    /// Build the stored record (derives the content address)
    pub fn into_record(self) -> PostRecord {
        PostRecord::new(
            self.account,
            self.caption,
            self.location,
            self.publish_at,
            self.payload,
        )
    }
}

//! Type-safe identifiers.
//!
//! Newtype wrappers keep participant ids, request ids and session keys from
//! being mixed up at compile time.
//!
//! | Type | Backing | Scope |
//! |------|---------|-------|
//! | [`ParticipantId`] | string | One per enabled session (connection) |
//! | [`RequestId`] | UUID v4 | One per relay request |
//! | [`SessionKey`] | string | One per (page URL, space) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// ParticipantId
// ============================================================================

/// Identifies one participant for the lifetime of its connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps an existing identifier.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Correlates a relay request with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SessionKey
// ============================================================================

/// Pub/sub scope derived from a page URL and a logical space name.
///
/// Format: `{space}:{percent-encoded URL}` where the URL has its fragment
/// removed, so `#section` links on the same page share one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Derives the key for a page.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `page_url` does not parse
    /// - [`Error::Config`] if `space` is empty
    pub fn for_page(page_url: &str, space: &str) -> Result<Self> {
        if space.trim().is_empty() {
            return Err(Error::config("space name must not be empty"));
        }

        let mut url = Url::parse(page_url)?;
        url.set_fragment(None);

        Ok(Self(format!(
            "{space}:{}",
            urlencoding::encode(url.as_str())
        )))
    }

    /// Wraps a key received over the wire.
    #[inline]
    #[must_use]
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

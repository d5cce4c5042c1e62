//! Session configuration.
//!
//! # Example
//!
//! ```
//! use cursor_sync::SessionConfig;
//!
//! let config = SessionConfig::new()
//!     .with_space("design-review")
//!     .with_batch_interval_ms(50)
//!     .with_name("Ada");
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! Hosts can also load it from JSON:
//!
//! ```
//! use cursor_sync::SessionConfig;
//!
//! let config: SessionConfig =
//!     serde_json::from_str(r##"{ "batchIntervalMs": 200, "color": "#ff0000" }"##).unwrap();
//! assert_eq!(config.batch.interval_ms, 200);
//! assert_eq!(config.batch.size_limit, 50);
//! assert_eq!(config.space, "cursors");
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::capture::BatchPolicy;
use crate::color::Rgb;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Space used when none is configured.
pub const DEFAULT_SPACE: &str = "cursors";

fn default_space() -> String {
    DEFAULT_SPACE.to_string()
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Tunables for one cursor-sharing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Logical namespace; sessions only see peers in the same space and page.
    #[serde(default = "default_space")]
    pub space: String,

    /// Batching thresholds.
    #[serde(flatten)]
    pub batch: BatchPolicy,

    /// Cursor color. Derived from the participant id when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,

    /// Display name announced with presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            space: default_space(),
            batch: BatchPolicy::default(),
            color: None,
            name: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionConfig {
    /// Sets the space name.
    #[inline]
    #[must_use]
    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = space.into();
        self
    }

    /// Sets the batching window length.
    #[inline]
    #[must_use]
    pub fn with_batch_interval_ms(mut self, interval_ms: u64) -> Self {
        self.batch.interval_ms = interval_ms;
        self
    }

    /// Sets the per-batch sample ceiling.
    #[inline]
    #[must_use]
    pub fn with_batch_size_limit(mut self, size_limit: usize) -> Self {
        self.batch.size_limit = size_limit;
        self
    }

    /// Fixes the cursor color.
    #[inline]
    #[must_use]
    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets the display name.
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionConfig {
    /// Checks the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero batch interval, a zero size limit
    /// or a blank space name.
    pub fn validate(&self) -> Result<()> {
        self.batch.validate()?;

        if self.space.trim().is_empty() {
            return Err(Error::config("space name must not be empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.space, DEFAULT_SPACE);
        assert_eq!(config.batch, BatchPolicy::default());
        assert!(config.color.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = SessionConfig::new()
            .with_space("room")
            .with_batch_interval_ms(10)
            .with_batch_size_limit(5)
            .with_color(Rgb::new(1, 2, 3))
            .with_name("Grace");

        assert_eq!(config.space, "room");
        assert_eq!(config.batch.interval_ms, 10);
        assert_eq!(config.batch.size_limit, 5);
        assert_eq!(config.color, Some(Rgb::new(1, 2, 3)));
        assert_eq!(config.name.as_deref(), Some("Grace"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let err = SessionConfig::new()
            .with_batch_interval_ms(0)
            .validate()
            .expect_err("zero interval");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validate_rejects_zero_size_limit() {
        let err = SessionConfig::new()
            .with_batch_size_limit(0)
            .validate()
            .expect_err("zero size limit");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validate_rejects_blank_space() {
        let err = SessionConfig::new()
            .with_space("  ")
            .validate()
            .expect_err("blank space");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "space": "docs", "batchSizeLimit": 10, "name": "Lin" }"#)
                .expect("parse config");

        assert_eq!(config.space, "docs");
        assert_eq!(config.batch.size_limit, 10);
        assert_eq!(config.batch.interval_ms, 100);
        assert_eq!(config.name.as_deref(), Some("Lin"));
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let json = serde_json::to_value(SessionConfig::new()).expect("serialize");
        assert_eq!(json["batchIntervalMs"], 100);
        assert_eq!(json["batchSizeLimit"], 50);
        assert!(json.get("color").is_none());
    }
}

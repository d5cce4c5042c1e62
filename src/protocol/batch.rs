//! Cursor data carried between participants.
//!
//! # Format
//!
//! ```json
//! {
//!   "participantId": "a1b2...",
//!   "baseTimestamp": 1000,
//!   "seq": 7,
//!   "presenceColor": "#1e88e5",
//!   "samples": [
//!     {
//!       "capturedAtOffsetMs": 0,
//!       "anchor": { "kind": "elementIdOffset", "id": "main", "source": "id",
//!                   "offset": { "x": 0.5, "y": 0.25 } },
//!       "page": { "x": 410.0, "y": 220.0 }
//!     }
//!   ]
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::geometry::{Offset, Point};
use crate::identifiers::ParticipantId;

// ============================================================================
// Anchor
// ============================================================================

/// Where an element identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdSource {
    /// The element's `id` attribute.
    #[default]
    Id,
    /// The opt-in `data-cursor-anchor` attribute.
    DataAttribute,
}

/// Portable description of what the pointer is over.
///
/// Anchors are hints. The receiving document may lack the element or lay it
/// out differently, so every sample also carries absolute page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Anchor {
    /// Structural path from an `#id` ancestor or the document root.
    #[serde(rename_all = "camelCase")]
    ElementPath {
        /// Path string, e.g. `#main > ul[0] > li[3]`.
        path: String,
        /// Position inside the element's box.
        offset: Offset,
    },

    /// Element with a stable identifier.
    #[serde(rename_all = "camelCase")]
    ElementIdOffset {
        /// Identifier value.
        id: String,
        /// Attribute the identifier was read from.
        #[serde(default)]
        source: IdSource,
        /// Position inside the element's box.
        offset: Offset,
        /// Character position under the pointer, for text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<u32>,
    },

    /// Nothing resolvable; page coordinates only.
    None,
}

impl Anchor {
    /// Returns `true` for [`Anchor::None`].
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

// ============================================================================
// PositionSample
// ============================================================================

/// One captured pointer position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    /// Milliseconds after the batch's base timestamp.
    pub captured_at_offset_ms: u64,
    /// Anchor hint.
    pub anchor: Anchor,
    /// Absolute page coordinates, the unconditional fallback.
    pub page: Point,
}

// ============================================================================
// Batch
// ============================================================================

/// Samples sent as one atomic unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Sender.
    pub participant_id: ParticipantId,
    /// Sender clock at the first sample, in milliseconds.
    pub base_timestamp: u64,
    /// Per-sender counter; orders batches sharing a base timestamp.
    #[serde(default)]
    pub seq: u64,
    /// Samples in capture order.
    pub samples: Vec<PositionSample>,
    /// Sender's cursor color.
    pub presence_color: Rgb,
}

impl Batch {
    /// Ordering key used to discard stale or duplicate deliveries.
    #[inline]
    #[must_use]
    pub fn order_key(&self) -> (u64, u64) {
        (self.base_timestamp, self.seq)
    }

    /// Returns the number of samples.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the batch has no samples.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ============================================================================
// PresenceMeta
// ============================================================================

/// Metadata a participant announces when entering a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMeta {
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Cursor color.
    pub color: Rgb,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PresenceMeta {
    /// Creates presence metadata without a display name.
    #[inline]
    #[must_use]
    pub fn new(participant_id: ParticipantId, color: Rgb) -> Self {
        Self {
            participant_id,
            color,
            name: None,
        }
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
// Tests
// ============================================================================

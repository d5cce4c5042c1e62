//! Relay push frames.
//!
//! The relay pushes an [`Event`] to every other member of a session when
//! someone publishes a batch, enters, or leaves (including by dropping the
//! socket):
//!
//! | `method` | `params` |
//! |----------|----------|
//! | `cursor.batch` | `{ "batch": Batch }` |
//! | `presence.joined` | `{ "meta": PresenceMeta }` |
//! | `presence.left` | `{ "participantId": "…" }` |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;
use crate::identifiers::ParticipantId;

use super::batch::{Batch, PresenceMeta};

const CURSOR_BATCH: &str = "cursor.batch";
const PRESENCE_JOINED: &str = "presence.joined";
const PRESENCE_LEFT: &str = "presence.left";

// ============================================================================
// Event
// ============================================================================

/// Frame tag that tells pushes apart from replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Push {
    Event,
}

/// A push from the relay.
///
/// ```json
/// { "type": "event", "method": "presence.left", "params": { "participantId": "ada" } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: Push,
    pub method: String,
    pub params: Value,
}

impl Event {
    /// Fans out a published batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the batch cannot be
    /// serialized.
    pub fn batch(batch: &Batch) -> Result<Self> {
        Ok(Self::push(
            CURSOR_BATCH,
            json!({ "batch": serde_json::to_value(batch)? }),
        ))
    }

    /// Announces a participant entering.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the metadata cannot be
    /// serialized.
    pub fn joined(meta: &PresenceMeta) -> Result<Self> {
        Ok(Self::push(
            PRESENCE_JOINED,
            json!({ "meta": serde_json::to_value(meta)? }),
        ))
    }

    /// Announces a participant leaving or dropping its socket.
    #[must_use]
    pub fn left(participant_id: &ParticipantId) -> Self {
        Self::push(PRESENCE_LEFT, json!({ "participantId": participant_id }))
    }

    fn push(method: &str, params: Value) -> Self {
        Self {
            kind: Push::Event,
            method: method.to_owned(),
            params,
        }
    }

    /// Decodes the params for the method.
    ///
    /// A known method whose params do not decode is reported as
    /// [`ParsedEvent::Unknown`] so a newer relay cannot break older clients.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        let parsed = match self.method.as_str() {
            CURSOR_BATCH => self.decode("batch").map(ParsedEvent::CursorBatch),
            PRESENCE_JOINED => self.decode("meta").map(ParsedEvent::PresenceJoined),
            PRESENCE_LEFT => self
                .decode("participantId")
                .map(|participant_id| ParsedEvent::PresenceLeft { participant_id }),
            _ => None,
        };

        parsed.unwrap_or_else(|| ParsedEvent::Unknown {
            method: self.method.clone(),
            params: self.params.clone(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        T::deserialize(self.params.get(field)?).ok()
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// An [`Event`] with its params decoded.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    CursorBatch(Batch),
    PresenceJoined(PresenceMeta),
    /// Explicit leave or a dropped socket.
    PresenceLeft { participant_id: ParticipantId },
    Unknown { method: String, params: Value },
}

// ============================================================================
// Tests
// ============================================================================

//! Relay commands.
//!
//! Commands follow `module.methodName` format.
//!
//! | Module | Commands |
//! |--------|----------|
//! | `session` | `attach` |
//! | `presence` | `enter`, `leave`, `get` |
//! | `cursor` | `publish` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{ParticipantId, SessionKey};

use super::batch::{Batch, PresenceMeta};

// ============================================================================
// Command
// ============================================================================

/// Commands a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Binds the connection to a session. Must be the first command.
    #[serde(rename = "session.attach", rename_all = "camelCase")]
    Attach {
        /// Session to join.
        session_key: SessionKey,
        /// Identity of this connection.
        participant_id: ParticipantId,
    },

    /// Announces presence to the session.
    #[serde(rename = "presence.enter")]
    Enter {
        /// Metadata shown to others.
        meta: PresenceMeta,
    },

    /// Withdraws presence.
    #[serde(rename = "presence.leave")]
    Leave,

    /// Lists currently present participants.
    #[serde(rename = "presence.get")]
    GetPresence,

    /// Broadcasts a batch to the other members.
    #[serde(rename = "cursor.publish")]
    Publish {
        /// Batch to broadcast.
        batch: Batch,
    },
}

impl Command {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Attach { .. } => "session.attach",
            Self::Enter { .. } => "presence.enter",
            Self::Leave => "presence.leave",
            Self::GetPresence => "presence.get",
            Self::Publish { .. } => "cursor.publish",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    #[test]
    fn test_attach_serialization() {
        let command = Command::Attach {
            session_key: SessionKey::from_raw("cursors:page"),
            participant_id: ParticipantId::new("alice"),
        };
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(json["method"], "session.attach");
        assert_eq!(json["params"]["sessionKey"], "cursors:page");
        assert_eq!(json["params"]["participantId"], "alice");
    }

    #[test]
    fn test_unit_command_has_no_params() {
        let json = serde_json::to_value(Command::Leave).expect("serialize");
        assert_eq!(json["method"], "presence.leave");
        assert!(json.get("params").is_none());

        let back: Command = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, Command::Leave);
    }

    #[test]
    fn test_enter_deserialization() {
        let json = r##"{
            "method": "presence.enter",
            "params": { "meta": { "participantId": "bob", "color": "#43a047" } }
        }"##;
        let command: Command = serde_json::from_str(json).expect("parse");
        match command {
            Command::Enter { meta } => {
                assert_eq!(meta.participant_id.as_str(), "bob");
                assert_eq!(meta.color, Rgb::new(0x43, 0xa0, 0x47));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_method_names_match_serde() {
        for command in [Command::Leave, Command::GetPresence] {
            let json = serde_json::to_value(&command).expect("serialize");
            assert_eq!(json["method"], command.method());
        }
    }
}

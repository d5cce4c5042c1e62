//! Remote cursor rendering boundary.
//!
//! The engine decides *where* each remote cursor goes; a [`CursorRenderer`]
//! owns the actual visuals (DOM nodes, canvas sprites, terminal glyphs).
//! Renderers that inject DOM elements should mark them with
//! [`OWNED_MARKER_ATTRIBUTE`](crate::dom::OWNED_MARKER_ATTRIBUTE) so local
//! hit-testing ignores them.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::color::Rgb;
use crate::identifiers::ParticipantId;

// ============================================================================
// PositionUpdate
// ============================================================================

/// Move command for one remote cursor, in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    /// Whose cursor.
    pub participant_id: ParticipantId,
    /// Page x.
    pub x: f64,
    /// Page y.
    pub y: f64,
    /// Cursor color.
    pub color: Rgb,
}

// ============================================================================
// CursorRenderer
// ============================================================================

/// Receives create/update/destroy calls for remote cursors.
///
/// Calls for one participant always arrive as `create`, any number of
/// `update`s, then `destroy`.
pub trait CursorRenderer: Send {
    /// A participant appeared; draw nothing until the first update.
    fn create(&mut self, participant_id: &ParticipantId, color: Rgb);

    /// Move (and possibly recolor) a cursor.
    fn update(&mut self, update: &PositionUpdate);

    /// Remove a cursor.
    fn destroy(&mut self, participant_id: &ParticipantId);
}

// ============================================================================
// RenderCommand / CommandLog
// ============================================================================

/// A recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// `create` call.
    Create {
        /// Participant.
        participant_id: ParticipantId,
        /// Initial color.
        color: Rgb,
    },
    /// `update` call.
    Update(PositionUpdate),
    /// `destroy` call.
    Destroy {
        /// Participant.
        participant_id: ParticipantId,
    },
}

/// A renderer that records every call.
///
/// Clones share one log, so a host (or test) can keep a handle while the
/// session owns the renderer.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<RenderCommand>>>,
}

impl CommandLog {
    /// Creates an empty log.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded command.
    #[must_use]
    pub fn commands(&self) -> Vec<RenderCommand> {
        self.commands.lock().clone()
    }

    /// Returns recorded updates only.
    #[must_use]
    pub fn updates(&self) -> Vec<PositionUpdate> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::Update(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    /// Participants created and not yet destroyed, in creation order.
    #[must_use]
    pub fn live_cursors(&self) -> Vec<ParticipantId> {
        let mut live: Vec<ParticipantId> = Vec::new();
        for command in self.commands.lock().iter() {
            match command {
                RenderCommand::Create { participant_id, .. } => {
                    live.push(participant_id.clone());
                }
                RenderCommand::Destroy { participant_id } => {
                    live.retain(|p| p != participant_id);
                }
                RenderCommand::Update(_) => {}
            }
        }
        live
    }

    /// Removes all recorded commands.
    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl CursorRenderer for CommandLog {
    fn create(&mut self, participant_id: &ParticipantId, color: Rgb) {
        self.commands.lock().push(RenderCommand::Create {
            participant_id: participant_id.clone(),
            color,
        });
    }

    fn update(&mut self, update: &PositionUpdate) {
        self.commands
            .lock()
            .push(RenderCommand::Update(update.clone()));
    }

    fn destroy(&mut self, participant_id: &ParticipantId) {
        self.commands.lock().push(RenderCommand::Destroy {
            participant_id: participant_id.clone(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_shared_between_clones() {
        let log = CommandLog::new();
        let mut renderer = log.clone();
        let alice = ParticipantId::new("alice");

        renderer.create(&alice, Rgb::default());
        renderer.update(&PositionUpdate {
            participant_id: alice.clone(),
            x: 1.0,
            y: 2.0,
            color: Rgb::default(),
        });

        assert_eq!(log.commands().len(), 2);
        assert_eq!(log.updates()[0].x, 1.0);
        assert_eq!(log.live_cursors(), vec![alice.clone()]);

        renderer.destroy(&alice);
        assert!(log.live_cursors().is_empty());
    }

    #[test]
    fn test_position_update_serialization() {
        let update = PositionUpdate {
            participant_id: ParticipantId::new("bob"),
            x: 10.0,
            y: 20.5,
            color: Rgb::new(0, 0, 255),
        };
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json["participantId"], "bob");
        assert_eq!(json["color"], "#0000ff");
    }
}

//! In-process pub/sub hub.
//!
//! [`LocalHub`] keeps one room per [`SessionKey`]. Each [`HubTransport`] is a
//! participant's handle into its room. Useful for embedding several sessions
//! in one process and for tests.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::{ParticipantId, SessionKey};
use crate::protocol::{Batch, PresenceMeta};

use super::{Transport, TransportEvent};

// ============================================================================
// Room
// ============================================================================

#[derive(Debug, Default)]
struct Room {
    presence: FxHashMap<ParticipantId, PresenceMeta>,
    subscribers: FxHashMap<ParticipantId, mpsc::UnboundedSender<TransportEvent>>,
}

impl Room {
    /// Sends to everyone except `from`, pruning closed subscribers.
    fn broadcast(&mut self, from: &ParticipantId, event: &TransportEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|participant_id, tx| {
            if participant_id == from {
                return true;
            }
            match tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    fn is_empty(&self) -> bool {
        self.presence.is_empty() && self.subscribers.is_empty()
    }
}

// ============================================================================
// LocalHub
// ============================================================================

/// Rooms shared by every [`HubTransport`] created from this hub.
#[derive(Debug, Default)]
pub struct LocalHub {
    rooms: RwLock<FxHashMap<SessionKey, Room>>,
}

impl LocalHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a transport for `participant_id` in the room `session_key`.
    #[must_use]
    pub fn connect(
        self: &Arc<Self>,
        session_key: SessionKey,
        participant_id: ParticipantId,
    ) -> HubTransport {
        HubTransport {
            hub: Arc::clone(self),
            session_key,
            participant_id,
        }
    }

    /// Number of rooms with any presence or subscriber.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Participants present in a room.
    #[must_use]
    pub fn present(&self, session_key: &SessionKey) -> Vec<PresenceMeta> {
        self.rooms
            .read()
            .get(session_key)
            .map(|room| room.presence.values().cloned().collect())
            .unwrap_or_default()
    }

    fn with_room<R>(&self, session_key: &SessionKey, f: impl FnOnce(&mut Room) -> R) -> R {
        let mut rooms = self.rooms.write();
        let room = rooms.entry(session_key.clone()).or_default();
        let result = f(room);
        if room.is_empty() {
            rooms.remove(session_key);
        }
        result
    }
}

// ============================================================================
// HubTransport
// ============================================================================

/// One participant's handle into a [`LocalHub`] room.
#[derive(Debug, Clone)]
pub struct HubTransport {
    hub: Arc<LocalHub>,
    session_key: SessionKey,
    participant_id: ParticipantId,
}

impl HubTransport {
    /// Participant this transport speaks for.
    #[inline]
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Room this transport belongs to.
    #[inline]
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }
}

#[async_trait]
impl Transport for HubTransport {
    async fn publish(&self, batch: &Batch) -> Result<()> {
        let event = TransportEvent::Batch(batch.clone());
        let delivered = self.hub.with_room(&self.session_key, |room| {
            room.broadcast(&self.participant_id, &event)
        });
        trace!(participant = %self.participant_id, delivered, "Batch published");
        Ok(())
    }

    async fn enter(&self, meta: PresenceMeta) -> Result<()> {
        let event = TransportEvent::Joined(meta.clone());
        self.hub.with_room(&self.session_key, |room| {
            room.presence.insert(self.participant_id.clone(), meta);
            room.broadcast(&self.participant_id, &event);
        });
        debug!(participant = %self.participant_id, key = %self.session_key, "Entered");
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        let event = TransportEvent::Left(self.participant_id.clone());
        self.hub.with_room(&self.session_key, |room| {
            if room.presence.remove(&self.participant_id).is_some() {
                room.broadcast(&self.participant_id, &event);
            }
            room.subscribers.remove(&self.participant_id);
        });
        debug!(participant = %self.participant_id, key = %self.session_key, "Left");
        Ok(())
    }

    async fn presence(&self) -> Result<Vec<PresenceMeta>> {
        Ok(self.hub.present(&self.session_key))
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.with_room(&self.session_key, |room| {
            room.subscribers.insert(self.participant_id.clone(), tx);
        });
        Ok(rx)
    }
}

// ============================================================================
// Tests
// ============================================================================

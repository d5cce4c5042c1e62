//! Synchronous session state.
//!
//! A [`Session`] bundles everything one enabled cursor-sharing session
//! mutates: the local identity, the outgoing [`SampleEncoder`] and the
//! incoming [`Reconstructor`]. It performs no I/O and reads no clock, so the
//! event loop (or a test) drives it with explicit timestamps.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::anchor::ResolvedPosition;
use crate::capture::{BatchPolicy, SampleEncoder};
use crate::dom::Document;
use crate::identifiers::ParticipantId;
use crate::playback::{BatchOutcome, Reconstructor};
use crate::protocol::{Batch, PresenceMeta};
use crate::render::CursorRenderer;
use crate::transport::TransportEvent;

// ============================================================================
// Session
// ============================================================================

/// State of one enabled session.
#[derive(Debug)]
pub struct Session {
    local: PresenceMeta,
    encoder: SampleEncoder,
    reconstructor: Reconstructor,
}

impl Session {
    /// Creates a session for the local participant described by `local`.
    #[must_use]
    pub fn new(local: PresenceMeta, policy: BatchPolicy) -> Self {
        Self {
            encoder: SampleEncoder::new(local.participant_id.clone(), local.color, policy),
            reconstructor: Reconstructor::new(local.participant_id.clone()),
            local,
        }
    }

    /// Local presence metadata.
    #[inline]
    #[must_use]
    pub fn local(&self) -> &PresenceMeta {
        &self.local
    }

    /// Local participant.
    #[inline]
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.local.participant_id
    }

    /// Outgoing side.
    #[inline]
    #[must_use]
    pub fn encoder(&self) -> &SampleEncoder {
        &self.encoder
    }

    /// Incoming side.
    #[inline]
    #[must_use]
    pub fn reconstructor(&self) -> &Reconstructor {
        &self.reconstructor
    }

    // ========================================================================
    // Outgoing
    // ========================================================================

    /// Records a local pointer position.
    pub fn capture(&mut self, now_ms: u64, position: ResolvedPosition) {
        self.encoder.push(now_ms, position);
    }

    /// Takes every batch that is ready to publish at `now_ms`.
    pub fn poll_outgoing(&mut self, now_ms: u64) -> Vec<Batch> {
        std::iter::from_fn(|| self.encoder.poll(now_ms)).collect()
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    /// Seeds remote cursors from a presence listing.
    pub fn apply_presence_snapshot(
        &mut self,
        participants: Vec<PresenceMeta>,
        renderer: &mut dyn CursorRenderer,
    ) {
        self.reconstructor.on_presence_snapshot(participants, renderer);
    }

    /// Applies one event received from the transport at `now_ms`.
    pub fn handle_event(
        &mut self,
        now_ms: u64,
        event: TransportEvent,
        renderer: &mut dyn CursorRenderer,
    ) {
        match event {
            TransportEvent::Batch(batch) => {
                let outcome = self.reconstructor.on_batch_received(now_ms, batch, renderer);
                if let BatchOutcome::Scheduled(count) = outcome {
                    trace!(count, "Remote samples scheduled");
                }
            }
            TransportEvent::Joined(meta) => {
                self.reconstructor.on_participant_join(meta, renderer);
            }
            TransportEvent::Left(participant_id) => {
                self.reconstructor.on_participant_leave(&participant_id, renderer);
            }
        }
    }

    /// Replays remote updates due at `now_ms`.
    pub fn advance(
        &mut self,
        now_ms: u64,
        doc: &dyn Document,
        renderer: &mut dyn CursorRenderer,
    ) -> usize {
        self.reconstructor.advance(now_ms, doc, renderer)
    }

    // ========================================================================
    // Timing & teardown
    // ========================================================================

    /// Earliest time anything needs to happen, outgoing or incoming.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        match (self.encoder.next_deadline(), self.reconstructor.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drops the unsent partial batch and destroys every remote cursor.
    ///
    /// Returns the number of discarded samples. Safe to call repeatedly.
    pub fn shutdown(&mut self, renderer: &mut dyn CursorRenderer) -> usize {
        let discarded = self.encoder.discard();
        self.reconstructor.clear(renderer);
        discarded
    }
}

// ============================================================================
// Tests
// ============================================================================

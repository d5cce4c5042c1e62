//! Remote cursor reconstruction.
//!
//! Receives batches and presence changes, keeps one [`RemoteCursor`] per
//! remote participant, and replays each batch with its original intra-batch
//! timing: a sample captured `n` ms after the batch base is drawn `n` ms
//! after the batch arrives locally.
//!
//! Like the encoder, the reconstructor takes `now_ms` from the caller and
//! never reads a clock itself.
//!
//! # Ordering
//!
//! Batches from one participant are applied only if their
//! `(baseTimestamp, seq)` is strictly greater than the last applied one.
//! Older batches would rewind the cursor and duplicates would replay it, so
//! both are dropped.
//!
//! The last applied key outlives a leave. A redelivered batch that shows up
//! after the sender's `left` is still stale and never brings the cursor
//! back; a real rejoin publishes under a newer base timestamp.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::anchor::locate;
use crate::color::Rgb;
use crate::dom::Document;
use crate::geometry::Point;
use crate::identifiers::ParticipantId;
use crate::protocol::{Batch, PresenceMeta};
use crate::render::{CursorRenderer, PositionUpdate};

use super::timeline::Timeline;

// ============================================================================
// AnchorState
// ============================================================================

/// How the last replayed position was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorState {
    /// Nothing replayed yet.
    #[default]
    Awaiting,
    /// Resolved against a local element.
    Anchored,
    /// Page-coordinate fallback.
    Fallback,
}

// ============================================================================
// RemoteCursor
// ============================================================================

/// Everything known about one remote participant.
#[derive(Debug, Clone)]
pub struct RemoteCursor {
    /// Participant.
    pub participant_id: ParticipantId,
    /// Current color.
    pub color: Rgb,
    /// Display name from presence, if announced.
    pub name: Option<String>,
    /// Last drawn position.
    pub position: Option<Point>,
    /// How `position` was obtained.
    pub anchor_state: AnchorState,
    last_applied: Option<(u64, u64)>,
    epoch: u64,
}

// ============================================================================
// BatchOutcome
// ============================================================================

/// What [`Reconstructor::on_batch_received`] did with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Accepted; this many updates were scheduled.
    Scheduled(usize),
    /// Older than or equal to the last applied batch; dropped.
    Stale,
    /// Sent by the local participant; ignored.
    OwnEcho,
}

// ============================================================================
// Reconstructor
// ============================================================================

/// Tracks remote cursors and drives their playback.
#[derive(Debug)]
pub struct Reconstructor {
    local_id: ParticipantId,
    cursors: FxHashMap<ParticipantId, RemoteCursor>,
    /// Last applied `(base, seq)` of participants that left.
    departed: FxHashMap<ParticipantId, (u64, u64)>,
    timeline: Timeline,
    next_epoch: u64,
}

impl Reconstructor {
    /// Creates an empty reconstructor for the given local participant.
    #[must_use]
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            cursors: FxHashMap::default(),
            departed: FxHashMap::default(),
            timeline: Timeline::new(),
            next_epoch: 0,
        }
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    /// Accepts a batch received at local time `now_ms`.
    pub fn on_batch_received(
        &mut self,
        now_ms: u64,
        batch: Batch,
        renderer: &mut dyn CursorRenderer,
    ) -> BatchOutcome {
        if batch.participant_id == self.local_id {
            return BatchOutcome::OwnEcho;
        }

        let key = batch.order_key();
        let last = self
            .cursors
            .get(&batch.participant_id)
            .and_then(|c| c.last_applied)
            .or_else(|| self.departed.get(&batch.participant_id).copied());

        if last.is_some_and(|last| key <= last) {
            debug!(
                participant = %batch.participant_id,
                base = batch.base_timestamp,
                seq = batch.seq,
                "Dropping out-of-order batch"
            );
            return BatchOutcome::Stale;
        }

        self.departed.remove(&batch.participant_id);
        let cursor = self.ensure_cursor(&batch.participant_id, batch.presence_color, renderer);
        cursor.last_applied = Some(key);
        cursor.color = batch.presence_color;
        let epoch = cursor.epoch;

        let count = batch.samples.len();
        for sample in batch.samples {
            self.timeline.schedule(
                now_ms.saturating_add(sample.captured_at_offset_ms),
                batch.participant_id.clone(),
                epoch,
                batch.presence_color,
                sample,
            );
        }

        trace!(participant = %batch.participant_id, count, "Batch scheduled");
        BatchOutcome::Scheduled(count)
    }

    /// A participant announced presence.
    pub fn on_participant_join(&mut self, meta: PresenceMeta, renderer: &mut dyn CursorRenderer) {
        if meta.participant_id == self.local_id {
            return;
        }
        let cursor = self.ensure_cursor(&meta.participant_id, meta.color, renderer);
        cursor.color = meta.color;
        if meta.name.is_some() {
            cursor.name = meta.name;
        }
    }

    /// Seeds cursors for everyone already present, without positions.
    pub fn on_presence_snapshot(
        &mut self,
        participants: Vec<PresenceMeta>,
        renderer: &mut dyn CursorRenderer,
    ) {
        for meta in participants {
            self.on_participant_join(meta, renderer);
        }
    }

    /// A participant left; its cursor and pending updates go away.
    ///
    /// Unknown participants are ignored.
    pub fn on_participant_leave(
        &mut self,
        participant_id: &ParticipantId,
        renderer: &mut dyn CursorRenderer,
    ) {
        let Some(cursor) = self.cursors.remove(participant_id) else {
            trace!(participant = %participant_id, "Leave for unknown participant");
            return;
        };

        if let Some(last) = cursor.last_applied {
            let floor = self.departed.entry(participant_id.clone()).or_insert(last);
            *floor = (*floor).max(last);
        }

        let purged = self.timeline.purge(participant_id);
        renderer.destroy(&cursor.participant_id);
        debug!(participant = %participant_id, purged, "Remote cursor removed");
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Replays every update due at or before `now_ms`.
    ///
    /// Returns the number of updates drawn.
    pub fn advance(
        &mut self,
        now_ms: u64,
        doc: &dyn Document,
        renderer: &mut dyn CursorRenderer,
    ) -> usize {
        let mut drawn = 0;

        while let Some(update) = self.timeline.pop_due(now_ms) {
            let Some(cursor) = self.cursors.get_mut(&update.participant_id) else {
                continue;
            };
            if cursor.epoch != update.epoch {
                continue;
            }

            let located = locate(doc, &update.sample.anchor, update.sample.page);
            cursor.position = Some(located.point);
            cursor.anchor_state = if located.anchored {
                AnchorState::Anchored
            } else {
                AnchorState::Fallback
            };

            renderer.update(&PositionUpdate {
                participant_id: cursor.participant_id.clone(),
                x: located.point.x,
                y: located.point.y,
                color: update.color,
            });
            drawn += 1;
        }

        drawn
    }

    /// Earliest pending playback deadline.
    #[inline]
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timeline.next_deadline()
    }

    /// Destroys every cursor and cancels all pending playback.
    pub fn clear(&mut self, renderer: &mut dyn CursorRenderer) {
        self.timeline.clear();
        self.departed.clear();
        for (participant_id, _) in self.cursors.drain() {
            renderer.destroy(&participant_id);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Looks up one cursor.
    #[inline]
    #[must_use]
    pub fn cursor(&self, participant_id: &ParticipantId) -> Option<&RemoteCursor> {
        self.cursors.get(participant_id)
    }

    /// Number of tracked remote cursors.
    #[inline]
    #[must_use]
    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Number of scheduled, not yet drawn updates.
    #[inline]
    #[must_use]
    pub fn pending_updates(&self) -> usize {
        self.timeline.len()
    }

    fn ensure_cursor(
        &mut self,
        participant_id: &ParticipantId,
        color: Rgb,
        renderer: &mut dyn CursorRenderer,
    ) -> &mut RemoteCursor {
        let next_epoch = &mut self.next_epoch;
        self.cursors
            .entry(participant_id.clone())
            .or_insert_with(|| {
                let epoch = *next_epoch;
                *next_epoch += 1;
                renderer.create(participant_id, color);
                debug!(participant = %participant_id, "Remote cursor created");
                RemoteCursor {
                    participant_id: participant_id.clone(),
                    color,
                    name: None,
                    position: None,
                    anchor_state: AnchorState::Awaiting,
                    last_applied: None,
                    epoch,
                }
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementSpec, MemoryDocument};
    use crate::geometry::{Offset, Rect};
    use crate::protocol::{Anchor, IdSource, PositionSample};
    use crate::render::{CommandLog, RenderCommand};

    fn batch(from: &str, base: u64, seq: u64, samples: &[(u64, f64, f64)]) -> Batch {
        Batch {
            participant_id: ParticipantId::new(from),
            base_timestamp: base,
            seq,
            samples: samples
                .iter()
                .map(|&(t, x, y)| PositionSample {
                    captured_at_offset_ms: t,
                    anchor: Anchor::None,
                    page: Point::new(x, y),
                })
                .collect(),
            presence_color: Rgb::new(10, 20, 30),
        }
    }

    fn setup() -> (Reconstructor, MemoryDocument, CommandLog) {
        (
            Reconstructor::new(ParticipantId::new("me")),
            MemoryDocument::new(1000.0, 1000.0),
            CommandLog::new(),
        )
    }

    #[test]
    fn test_replay_preserves_relative_timing() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();

        let outcome = rec.on_batch_received(
            2000,
            batch("a", 1000, 0, &[(0, 10.0, 10.0), (50, 20.0, 15.0)]),
            &mut renderer,
        );
        assert_eq!(outcome, BatchOutcome::Scheduled(2));
        assert_eq!(rec.next_deadline(), Some(2000));

        assert_eq!(rec.advance(2000, &doc, &mut renderer), 1);
        assert_eq!(rec.next_deadline(), Some(2050));
        assert_eq!(rec.advance(2049, &doc, &mut renderer), 0);
        assert_eq!(rec.advance(2050, &doc, &mut renderer), 1);

        let points: Vec<(f64, f64)> = log.updates().iter().map(|u| (u.x, u.y)).collect();
        assert_eq!(points, vec![(10.0, 10.0), (20.0, 15.0)]);
    }

    #[test]
    fn test_first_batch_creates_cursor() {
        let (mut rec, _, log) = setup();
        let mut renderer = log.clone();
        rec.on_batch_received(0, batch("a", 1, 0, &[(0, 1.0, 1.0)]), &mut renderer);

        assert_eq!(
            log.commands()[0],
            RenderCommand::Create {
                participant_id: ParticipantId::new("a"),
                color: Rgb::new(10, 20, 30),
            }
        );
        assert_eq!(rec.cursor_count(), 1);
    }

    #[test]
    fn test_out_of_order_batch_dropped() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();

        rec.on_batch_received(0, batch("a", 500, 1, &[(0, 5.0, 5.0)]), &mut renderer);
        let outcome = rec.on_batch_received(0, batch("a", 400, 0, &[(0, 4.0, 4.0)]), &mut renderer);
        assert_eq!(outcome, BatchOutcome::Stale);

        rec.advance(10, &doc, &mut renderer);
        assert_eq!(log.updates().len(), 1);
        assert_eq!(log.updates()[0].x, 5.0);
    }

    #[test]
    fn test_duplicate_delivery_dropped() {
        let (mut rec, _, log) = setup();
        let mut renderer = log.clone();
        let b = batch("a", 500, 3, &[(0, 5.0, 5.0)]);

        rec.on_batch_received(0, b.clone(), &mut renderer);
        assert_eq!(rec.on_batch_received(0, b, &mut renderer), BatchOutcome::Stale);
        assert_eq!(rec.pending_updates(), 1);
    }

    #[test]
    fn test_same_base_higher_seq_accepted() {
        let (mut rec, _, log) = setup();
        let mut renderer = log.clone();
        rec.on_batch_received(0, batch("a", 500, 0, &[(0, 1.0, 1.0)]), &mut renderer);
        let outcome = rec.on_batch_received(0, batch("a", 500, 1, &[(0, 2.0, 2.0)]), &mut renderer);
        assert_eq!(outcome, BatchOutcome::Scheduled(1));
    }

    #[test]
    fn test_own_batches_ignored() {
        let (mut rec, _, log) = setup();
        let mut renderer = log.clone();
        let outcome = rec.on_batch_received(0, batch("me", 1, 0, &[(0, 1.0, 1.0)]), &mut renderer);
        assert_eq!(outcome, BatchOutcome::OwnEcho);
        assert!(log.commands().is_empty());
    }

    #[test]
    fn test_leave_cancels_pending_updates() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();
        let a = ParticipantId::new("a");

        rec.on_batch_received(0, batch("a", 1, 0, &[(0, 1.0, 1.0), (100, 2.0, 2.0)]), &mut renderer);
        rec.advance(0, &doc, &mut renderer);
        rec.on_participant_leave(&a, &mut renderer);

        assert_eq!(rec.advance(1_000, &doc, &mut renderer), 0);
        assert_eq!(rec.pending_updates(), 0);
        assert!(log.live_cursors().is_empty());
    }

    #[test]
    fn test_rejoin_does_not_replay_old_epoch() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();
        let a = ParticipantId::new("a");

        rec.on_batch_received(0, batch("a", 1, 0, &[(100, 1.0, 1.0)]), &mut renderer);
        rec.on_participant_leave(&a, &mut renderer);
        rec.on_participant_join(PresenceMeta::new(a.clone(), Rgb::default()), &mut renderer);

        assert_eq!(rec.advance(1_000, &doc, &mut renderer), 0);
        assert_eq!(rec.cursor(&a).map(|c| c.anchor_state), Some(AnchorState::Awaiting));
    }

    #[test]
    fn test_redelivered_batch_after_leave_stays_dropped() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();
        let a = ParticipantId::new("a");
        let b = batch("a", 1000, 0, &[(0, 3.0, 4.0)]);

        rec.on_batch_received(0, b.clone(), &mut renderer);
        rec.advance(0, &doc, &mut renderer);
        rec.on_participant_leave(&a, &mut renderer);
        let commands = log.commands();

        assert_eq!(rec.on_batch_received(50, b, &mut renderer), BatchOutcome::Stale);
        assert_eq!(rec.advance(1_000, &doc, &mut renderer), 0);
        assert_eq!(rec.cursor_count(), 0);
        assert_eq!(log.commands(), commands);
        assert!(log.live_cursors().is_empty());
    }

    #[test]
    fn test_rejoin_with_newer_batch_is_drawn() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();
        let a = ParticipantId::new("a");

        rec.on_batch_received(0, batch("a", 1000, 4, &[(0, 1.0, 1.0)]), &mut renderer);
        rec.on_participant_leave(&a, &mut renderer);

        // Older than what was applied before the leave.
        let outcome = rec.on_batch_received(0, batch("a", 900, 9, &[(0, 9.0, 9.0)]), &mut renderer);
        assert_eq!(outcome, BatchOutcome::Stale);

        let outcome = rec.on_batch_received(0, batch("a", 5000, 0, &[(0, 2.0, 2.0)]), &mut renderer);
        assert_eq!(outcome, BatchOutcome::Scheduled(1));
        rec.advance(0, &doc, &mut renderer);
        assert_eq!(rec.cursor(&a).and_then(|c| c.position), Some(Point::new(2.0, 2.0)));
        assert_eq!(log.live_cursors(), vec![a]);
    }

    #[test]
    fn test_snapshot_then_leave_without_batch() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();
        let ghost = ParticipantId::new("ghost");

        rec.on_presence_snapshot(
            vec![
                PresenceMeta::new(ghost.clone(), Rgb::default()),
                PresenceMeta::new(ParticipantId::new("me"), Rgb::default()),
            ],
            &mut renderer,
        );
        assert_eq!(rec.cursor_count(), 1);
        assert_eq!(rec.cursor(&ghost).and_then(|c| c.position), None);

        rec.on_participant_leave(&ghost, &mut renderer);
        rec.advance(10_000, &doc, &mut renderer);

        assert_eq!(
            log.commands(),
            vec![
                RenderCommand::Create {
                    participant_id: ghost.clone(),
                    color: Rgb::default(),
                },
                RenderCommand::Destroy {
                    participant_id: ghost,
                },
            ]
        );
    }

    #[test]
    fn test_leave_unknown_is_noop() {
        let (mut rec, _, log) = setup();
        let mut renderer = log.clone();
        rec.on_participant_leave(&ParticipantId::new("nobody"), &mut renderer);
        assert!(log.commands().is_empty());
    }

    #[test]
    fn test_anchor_resolution_and_fallback_states() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();
        doc.append(
            doc.body(),
            ElementSpec::new("div")
                .id("box")
                .rect(Rect::new(100.0, 100.0, 100.0, 100.0)),
        );

        let mut b = batch("a", 1, 0, &[(0, 9.0, 9.0), (10, 7.0, 7.0)]);
        b.samples[0].anchor = Anchor::ElementIdOffset {
            id: "box".into(),
            source: IdSource::Id,
            offset: Offset::new(0.5, 0.5),
            index: None,
        };
        b.samples[1].anchor = Anchor::ElementIdOffset {
            id: "gone".into(),
            source: IdSource::Id,
            offset: Offset::new(0.5, 0.5),
            index: None,
        };
        rec.on_batch_received(0, b, &mut renderer);

        let a = ParticipantId::new("a");
        rec.advance(0, &doc, &mut renderer);
        assert_eq!(rec.cursor(&a).map(|c| c.anchor_state), Some(AnchorState::Anchored));
        assert_eq!(rec.cursor(&a).and_then(|c| c.position), Some(Point::new(150.0, 150.0)));

        rec.advance(10, &doc, &mut renderer);
        assert_eq!(rec.cursor(&a).map(|c| c.anchor_state), Some(AnchorState::Fallback));
        assert_eq!(rec.cursor(&a).and_then(|c| c.position), Some(Point::new(7.0, 7.0)));
    }

    #[test]
    fn test_clear_destroys_everything() {
        let (mut rec, doc, log) = setup();
        let mut renderer = log.clone();
        rec.on_batch_received(0, batch("a", 1, 0, &[(10, 1.0, 1.0)]), &mut renderer);
        rec.on_batch_received(0, batch("b", 1, 0, &[(10, 1.0, 1.0)]), &mut renderer);

        rec.clear(&mut renderer);
        rec.clear(&mut renderer);

        assert_eq!(rec.cursor_count(), 0);
        assert_eq!(rec.pending_updates(), 0);
        assert_eq!(rec.advance(100, &doc, &mut renderer), 0);
        assert!(log.live_cursors().is_empty());
    }
}

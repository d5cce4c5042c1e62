//! Deadline queue for scheduled cursor updates.

// ============================================================================
// Imports
// ============================================================================

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::color::Rgb;
use crate::identifiers::ParticipantId;
use crate::protocol::PositionSample;

// ============================================================================
// ScheduledUpdate
// ============================================================================

/// One sample waiting to be replayed.
#[derive(Debug, Clone)]
pub struct ScheduledUpdate {
    /// Local time the update is due, in milliseconds.
    pub due_ms: u64,
    /// Owner.
    pub participant_id: ParticipantId,
    /// Cursor generation the update belongs to.
    pub epoch: u64,
    /// Color carried by the batch.
    pub color: Rgb,
    /// The sample to replay.
    pub sample: PositionSample,
    /// Insertion counter; keeps equal deadlines in arrival order.
    order: u64,
}

impl ScheduledUpdate {
    fn key(&self) -> (u64, u64) {
        (self.due_ms, self.order)
    }
}

impl PartialEq for ScheduledUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledUpdate {}

impl PartialOrd for ScheduledUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledUpdate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

// ============================================================================
// Timeline
// ============================================================================

/// Min-heap of scheduled updates ordered by deadline, then arrival.
#[derive(Debug, Default)]
pub struct Timeline {
    heap: BinaryHeap<Reverse<ScheduledUpdate>>,
    next_order: u64,
}

impl Timeline {
    /// Creates an empty timeline.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a sample.
    pub fn schedule(
        &mut self,
        due_ms: u64,
        participant_id: ParticipantId,
        epoch: u64,
        color: Rgb,
        sample: PositionSample,
    ) {
        let order = self.next_order;
        self.next_order += 1;
        self.heap.push(Reverse(ScheduledUpdate {
            due_ms,
            participant_id,
            epoch,
            color,
            sample,
            order,
        }));
    }

    /// Removes and returns the earliest update due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<ScheduledUpdate> {
        if self.heap.peek()?.0.due_ms > now_ms {
            return None;
        }
        self.heap.pop().map(|Reverse(update)| update)
    }

    /// Earliest pending deadline.
    #[inline]
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(update)| update.due_ms)
    }

    /// Drops every pending update for one participant.
    ///
    /// Returns how many were dropped.
    pub fn purge(&mut self, participant_id: &ParticipantId) -> usize {
        let before = self.heap.len();
        self.heap
            .retain(|Reverse(update)| &update.participant_id != participant_id);
        before - self.heap.len()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Pending updates.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::protocol::Anchor;

    fn sample(x: f64) -> PositionSample {
        PositionSample {
            captured_at_offset_ms: 0,
            anchor: Anchor::None,
            page: Point::new(x, 0.0),
        }
    }

    #[test]
    fn test_pops_in_deadline_then_arrival_order() {
        let mut timeline = Timeline::new();
        let p = ParticipantId::new("p");
        timeline.schedule(20, p.clone(), 0, Rgb::default(), sample(1.0));
        timeline.schedule(10, p.clone(), 0, Rgb::default(), sample(2.0));
        timeline.schedule(10, p.clone(), 0, Rgb::default(), sample(3.0));

        assert_eq!(timeline.next_deadline(), Some(10));
        assert!(timeline.pop_due(9).is_none());

        let xs: Vec<f64> = std::iter::from_fn(|| timeline.pop_due(20))
            .map(|u| u.sample.page.x)
            .collect();
        assert_eq!(xs, vec![2.0, 3.0, 1.0]);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_purge_only_affects_one_participant() {
        let mut timeline = Timeline::new();
        let a = ParticipantId::new("a");
        let b = ParticipantId::new("b");
        timeline.schedule(1, a.clone(), 0, Rgb::default(), sample(1.0));
        timeline.schedule(2, b.clone(), 0, Rgb::default(), sample(2.0));
        timeline.schedule(3, a.clone(), 0, Rgb::default(), sample(3.0));

        assert_eq!(timeline.purge(&a), 2);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.pop_due(10).map(|u| u.participant_id), Some(b));
    }
}

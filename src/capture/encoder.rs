//! Pointer sample batching.
//!
//! The encoder forwards every captured sample; nothing is dropped or
//! synthesized. Rate is bounded by batching: one window opens at the first
//! sample and closes after `interval_ms` or at `size_limit` samples,
//! whichever comes first.
//!
//! The encoder is clock-agnostic: callers pass `now_ms` from whatever
//! monotonic clock they use, which keeps it deterministic under test.
//!
//! # Example
//!
//! ```
//! use cursor_sync::capture::{BatchPolicy, SampleEncoder};
//! use cursor_sync::anchor::ResolvedPosition;
//! use cursor_sync::color::Rgb;
//! use cursor_sync::geometry::Point;
//! use cursor_sync::identifiers::ParticipantId;
//! use cursor_sync::protocol::Anchor;
//!
//! let mut encoder = SampleEncoder::new(
//!     ParticipantId::new("alice"),
//!     Rgb::default(),
//!     BatchPolicy::default(),
//! );
//!
//! let position = ResolvedPosition { anchor: Anchor::None, page: Point::new(10.0, 10.0) };
//! encoder.push(1_000, position);
//! assert!(encoder.poll(1_050).is_none());
//! assert_eq!(encoder.poll(1_100).map(|b| b.len()), Some(1));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::mem;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::anchor::ResolvedPosition;
use crate::color::Rgb;
use crate::error::{Error, Result};
use crate::identifiers::ParticipantId;
use crate::protocol::{Batch, PositionSample};

// ============================================================================
// Constants
// ============================================================================

/// Default batching window.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 100;

/// Default sample ceiling per batch.
pub const DEFAULT_BATCH_SIZE_LIMIT: usize = 50;

// ============================================================================
// BatchPolicy
// ============================================================================

/// When to close a batching window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchPolicy {
    /// Window length in milliseconds.
    #[serde(rename = "batchIntervalMs")]
    pub interval_ms: u64,
    /// Maximum samples per batch.
    #[serde(rename = "batchSizeLimit")]
    pub size_limit: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            size_limit: DEFAULT_BATCH_SIZE_LIMIT,
        }
    }
}

impl BatchPolicy {
    /// Checks both thresholds are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either threshold is zero.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::config("batch interval must be greater than zero"));
        }
        if self.size_limit == 0 {
            return Err(Error::config("batch size limit must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// EncoderStats
// ============================================================================

/// Running totals, mostly for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Samples accepted by [`SampleEncoder::push`].
    pub captured: u64,
    /// Samples handed out in batches.
    pub emitted_samples: u64,
    /// Batches handed out.
    pub emitted_batches: u64,
    /// Samples dropped by [`SampleEncoder::discard`].
    pub discarded: u64,
}

// ============================================================================
// SampleEncoder
// ============================================================================

/// Accumulates samples into [`Batch`]es.
#[derive(Debug)]
pub struct SampleEncoder {
    participant_id: ParticipantId,
    color: Rgb,
    policy: BatchPolicy,
    /// Base timestamp of the open window.
    base: Option<u64>,
    samples: Vec<PositionSample>,
    /// Closed batches waiting to be polled.
    ready: VecDeque<Batch>,
    next_seq: u64,
    stats: EncoderStats,
}

impl SampleEncoder {
    /// Creates an encoder for one participant.
    #[must_use]
    pub fn new(participant_id: ParticipantId, color: Rgb, policy: BatchPolicy) -> Self {
        Self {
            participant_id,
            color,
            policy,
            base: None,
            samples: Vec::with_capacity(policy.size_limit.min(256)),
            ready: VecDeque::new(),
            next_seq: 0,
            stats: EncoderStats::default(),
        }
    }

    /// Records one pointer position captured at `now_ms`.
    ///
    /// A window whose interval already elapsed is closed first, so a late
    /// timer never stretches a batch past its window.
    pub fn push(&mut self, now_ms: u64, position: ResolvedPosition) {
        if self.window_expired(now_ms) {
            self.close_window();
        }

        let base = *self.base.get_or_insert(now_ms);
        let last = self
            .samples
            .last()
            .map_or(0, |s| s.captured_at_offset_ms);

        self.samples.push(PositionSample {
            captured_at_offset_ms: now_ms.saturating_sub(base).max(last),
            anchor: position.anchor,
            page: position.page,
        });
        self.stats.captured += 1;

        if self.samples.len() >= self.policy.size_limit {
            trace!(count = self.samples.len(), "Batch size limit reached");
            self.close_window();
        }
    }

    /// Returns the next batch that is due at `now_ms`, if any.
    ///
    /// Call repeatedly until it returns `None`.
    pub fn poll(&mut self, now_ms: u64) -> Option<Batch> {
        if self.ready.is_empty() && self.window_expired(now_ms) {
            self.close_window();
        }
        self.ready.pop_front()
    }

    /// Closes the open window regardless of timing.
    pub fn flush(&mut self) -> Option<Batch> {
        self.close_window();
        self.ready.pop_front()
    }

    /// Drops the open window and anything not yet polled.
    ///
    /// Returns the number of samples dropped.
    pub fn discard(&mut self) -> usize {
        let dropped =
            self.samples.len() + self.ready.iter().map(Batch::len).sum::<usize>();
        self.samples.clear();
        self.ready.clear();
        self.base = None;
        self.stats.discarded += dropped as u64;

        if dropped > 0 {
            debug!(dropped, "Discarded in-flight samples");
        }
        dropped
    }

    /// When the open window closes, if one is open.
    ///
    /// A closed batch that has not been polled yet is due immediately and
    /// reports `Some(0)`.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        if !self.ready.is_empty() {
            return Some(0);
        }
        self.base
            .map(|base| base.saturating_add(self.policy.interval_ms))
    }

    /// Samples captured but not yet handed out.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.samples.len() + self.ready.iter().map(Batch::len).sum::<usize>()
    }

    /// Running totals.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    /// The policy in effect.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    fn window_expired(&self, now_ms: u64) -> bool {
        self.base
            .is_some_and(|base| now_ms >= base.saturating_add(self.policy.interval_ms))
    }

    fn close_window(&mut self) {
        let Some(base) = self.base.take() else {
            return;
        };
        if self.samples.is_empty() {
            return;
        }

        let samples = mem::replace(
            &mut self.samples,
            Vec::with_capacity(self.policy.size_limit.min(256)),
        );
        let batch = Batch {
            participant_id: self.participant_id.clone(),
            base_timestamp: base,
            seq: self.next_seq,
            samples,
            presence_color: self.color,
        };

        self.next_seq += 1;
        self.stats.emitted_batches += 1;
        self.stats.emitted_samples += batch.len() as u64;

        trace!(
            seq = batch.seq,
            base = batch.base_timestamp,
            count = batch.len(),
            "Batch closed"
        );
        self.ready.push_back(batch);
    }
}

// ============================================================================
// Tests
// ============================================================================

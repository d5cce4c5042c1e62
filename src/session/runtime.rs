//! Session event loop.
//!
//! One task per enabled session owns the [`Session`], the renderer and the
//! document handle. It wakes for:
//!
//! - Local pointer positions handed off by the controller
//! - Events from the transport subscription
//! - The shutdown signal
//! - The earliest encoder or playback deadline
//!
//! Ready batches go to a separate publisher task so a slow transport never
//! stalls capture or playback.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, trace, warn};

use crate::anchor::ResolvedPosition;
use crate::dom::Document;
use crate::error::Error;
use crate::protocol::Batch;
use crate::render::CursorRenderer;
use crate::transport::{Transport, TransportEvent};

use super::core::Session;

/// Longest a single publish may take before the batch is given up.
pub(crate) const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SessionClock
// ============================================================================

/// Maps tokio instants to epoch milliseconds.
///
/// Wall-clock time is read once; everything after follows the monotonic
/// (and, in tests, pausable) tokio clock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionClock {
    origin: Instant,
    origin_ms: u64,
}

impl SessionClock {
    pub(crate) fn start() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }

    pub(crate) fn ms_at(&self, at: Instant) -> u64 {
        let elapsed = at.saturating_duration_since(self.origin);
        self.origin_ms.saturating_add(elapsed.as_millis() as u64)
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.ms_at(Instant::now())
    }

    pub(crate) fn instant_at(&self, ms: u64) -> Instant {
        self.origin + Duration::from_millis(ms.saturating_sub(self.origin_ms))
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A resolved local pointer position and when it was captured.
#[derive(Debug, Clone)]
pub(crate) struct CapturedPosition {
    pub(crate) at: Instant,
    pub(crate) position: ResolvedPosition,
}

/// Control messages for the loop.
#[derive(Debug)]
pub(crate) enum Control {
    /// Tear down and exit.
    Shutdown,
}

// ============================================================================
// SessionRuntime
// ============================================================================

/// Everything the loop task owns.
pub(crate) struct SessionRuntime {
    pub(crate) session: Session,
    pub(crate) clock: SessionClock,
    pub(crate) document: Arc<dyn Document>,
    pub(crate) renderer: Box<dyn CursorRenderer>,
    pub(crate) pointer_rx: mpsc::UnboundedReceiver<CapturedPosition>,
    pub(crate) transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    pub(crate) control_rx: mpsc::UnboundedReceiver<Control>,
    pub(crate) publish_tx: mpsc::UnboundedSender<Batch>,
}

impl SessionRuntime {
    /// Runs until shutdown, then hands the renderer back.
    pub(crate) async fn run(mut self) -> Box<dyn CursorRenderer> {
        let participant = self.session.participant_id().clone();
        debug!(%participant, "Session loop started");

        let mut transport_open = true;

        loop {
            let deadline = self
                .session
                .next_deadline()
                .map(|ms| self.clock.instant_at(ms));

            tokio::select! {
                biased;

                control = self.control_rx.recv() => {
                    match control {
                        Some(Control::Shutdown) | None => break,
                    }
                }

                captured = self.pointer_rx.recv() => {
                    let Some(captured) = captured else { break };
                    let now_ms = self.clock.ms_at(captured.at);
                    self.session.capture(now_ms, captured.position);
                }

                event = self.transport_rx.recv(), if transport_open => {
                    match event {
                        Some(event) => {
                            let now_ms = self.clock.now_ms();
                            self.session.handle_event(now_ms, event, self.renderer.as_mut());
                        }
                        None => {
                            warn!(%participant, "Transport subscription ended");
                            transport_open = false;
                        }
                    }
                }

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
            }

            self.tick();
        }

        let discarded = self.session.shutdown(self.renderer.as_mut());
        debug!(%participant, discarded, "Session loop stopped");

        self.renderer
    }

    /// Publishes ready batches and replays due remote updates.
    fn tick(&mut self) {
        let now_ms = self.clock.now_ms();

        for batch in self.session.poll_outgoing(now_ms) {
            trace!(samples = batch.len(), seq = batch.seq, "Batch ready");
            if self.publish_tx.send(batch).is_err() {
                warn!("Publisher stopped; dropping batch");
            }
        }

        self.session
            .advance(now_ms, self.document.as_ref(), self.renderer.as_mut());
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Publishes batches in order until the channel closes and is drained.
///
/// The loop drops its sender on exit, so the task ends once every handed-off
/// batch has been attempted. Failures and timeouts are logged and the batch
/// is dropped; capture keeps going.
pub(crate) fn spawn_publisher(
    transport: Arc<dyn Transport>,
    mut publish_rx: mpsc::UnboundedReceiver<Batch>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = publish_rx.recv().await {
            let published = timeout(PUBLISH_TIMEOUT, transport.publish(&batch))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::transport_timeout(PUBLISH_TIMEOUT.as_millis() as u64))
                });
            if let Err(e) = published {
                warn!(
                    error = %e,
                    recoverable = e.is_recoverable(),
                    samples = batch.len(),
                    "Failed to publish batch"
                );
            }
        }
        trace!("Publisher stopped");
    })
}

// ============================================================================
// Tests
// ============================================================================

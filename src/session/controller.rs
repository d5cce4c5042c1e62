//! Host-facing session handle.
//!
//! [`SessionController`] turns cursor sharing on and off for one page and
//! forwards local pointer moves to the running session.
//!
//! # Lifecycle
//!
//! ```text
//! disabled ──enable()──► enabled ──disable()──► disabled
//!     ▲                                             │
//!     └──────────────── toggle_cursor_sharing() ────┘
//! ```
//!
//! Enabling subscribes to the transport, seeds remote cursors from the
//! current presence, announces the local participant and starts the event
//! loop. Disabling stops the loop, drops the unsent partial batch, removes
//! every remote cursor and withdraws presence.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::anchor::resolve;
use crate::capture::PointerMove;
use crate::color::Rgb;
use crate::dom::Document;
use crate::error::{Error, Result};
use crate::identifiers::{ParticipantId, SessionKey};
use crate::protocol::PresenceMeta;
use crate::render::CursorRenderer;
use crate::transport::Transport;

use super::builder::SessionBuilder;
use super::config::SessionConfig;
use super::core::Session;
use super::runtime::{
    CapturedPosition, Control, PUBLISH_TIMEOUT, SessionClock, SessionRuntime, spawn_publisher,
};

/// How long `disable` waits for handed-off batches before giving up on them.
const DRAIN_TIMEOUT: Duration = PUBLISH_TIMEOUT;

// ============================================================================
// Running
// ============================================================================

/// Handles to a live session loop.
struct Running {
    pointer_tx: mpsc::UnboundedSender<CapturedPosition>,
    control_tx: mpsc::UnboundedSender<Control>,
    task: JoinHandle<Box<dyn CursorRenderer>>,
    publisher: JoinHandle<()>,
}

// ============================================================================
// SessionController
// ============================================================================

/// Enables, disables and feeds one cursor-sharing session.
///
/// Create with [`SessionController::builder()`].
pub struct SessionController {
    config: SessionConfig,
    session_key: SessionKey,
    participant_id: ParticipantId,
    color: Rgb,
    transport: Arc<dyn Transport>,
    document: Arc<dyn Document>,
    /// Parked here while disabled; owned by the loop while enabled.
    renderer: Option<Box<dyn CursorRenderer>>,
    running: Option<Running>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("session_key", &self.session_key)
            .field("participant_id", &self.participant_id)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionController - Constructor
// ============================================================================

impl SessionController {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn new(
        config: SessionConfig,
        session_key: SessionKey,
        participant_id: ParticipantId,
        transport: Arc<dyn Transport>,
        document: Arc<dyn Document>,
        renderer: Box<dyn CursorRenderer>,
    ) -> Self {
        let color = config
            .color
            .unwrap_or_else(|| Rgb::from_seed(participant_id.as_str()));

        Self {
            config,
            session_key,
            participant_id,
            color,
            transport,
            document,
            renderer: Some(renderer),
            running: None,
        }
    }
}

// ============================================================================
// SessionController - Accessors
// ============================================================================

impl SessionController {
    /// Returns `true` while the session loop is running.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.running.is_some()
    }

    /// Local participant.
    #[inline]
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Pub/sub scope of this session.
    #[inline]
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Local cursor color.
    #[inline]
    #[must_use]
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Configuration in effect.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn presence_meta(&self) -> PresenceMeta {
        let meta = PresenceMeta::new(self.participant_id.clone(), self.color);
        match &self.config.name {
            Some(name) => meta.with_name(name.clone()),
            None => meta,
        }
    }
}

// ============================================================================
// SessionController - Lifecycle
// ============================================================================

impl SessionController {
    /// Starts sharing. Does nothing if already enabled.
    ///
    /// Presence lookup and announcement failures are logged, not returned.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - Any transport error from subscribing
    /// - [`Error::SessionClosed`] if an earlier loop was lost
    pub async fn enable(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }

        self.config.validate()?;

        let Some(mut renderer) = self.renderer.take() else {
            return Err(Error::SessionClosed);
        };

        let transport_rx = match self.transport.subscribe().await {
            Ok(rx) => rx,
            Err(e) => {
                self.renderer = Some(renderer);
                return Err(e);
            }
        };

        let snapshot = self.transport.presence().await.unwrap_or_else(|e| {
            warn!(error = %e, key = %self.session_key, "Presence lookup failed");
            Vec::new()
        });

        let meta = self.presence_meta();
        if let Err(e) = self.transport.enter(meta.clone()).await {
            warn!(error = %e, key = %self.session_key, "Presence announcement failed");
        }

        let mut session = Session::new(meta, self.config.batch);
        session.apply_presence_snapshot(snapshot, renderer.as_mut());

        let (pointer_tx, pointer_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();

        let publisher = spawn_publisher(Arc::clone(&self.transport), publish_rx);
        let runtime = SessionRuntime {
            session,
            clock: SessionClock::start(),
            document: Arc::clone(&self.document),
            renderer,
            pointer_rx,
            transport_rx,
            control_rx,
            publish_tx,
        };
        let task = tokio::spawn(runtime.run());

        self.running = Some(Running {
            pointer_tx,
            control_tx,
            task,
            publisher,
        });

        info!(
            participant = %self.participant_id,
            key = %self.session_key,
            "Cursor sharing enabled"
        );
        Ok(())
    }

    /// Stops sharing. Does nothing if already disabled.
    ///
    /// Once this returns no scheduled update or batch timer fires. The
    /// unsent partial batch is dropped; batches already closed are published
    /// before presence is withdrawn, waiting at most a few seconds. A failed
    /// withdrawal is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the loop task had panicked.
    pub async fn disable(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let _ = running.control_tx.send(Control::Shutdown);
        drop(running.pointer_tx);

        let result = match running.task.await {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Session loop failed");
                Err(Error::SessionClosed)
            }
        };

        // The loop dropped its sender, so the publisher ends once drained.
        let mut publisher = running.publisher;
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut publisher).await.is_err() {
            warn!(key = %self.session_key, "Publisher did not drain; dropping queued batches");
            publisher.abort();
        }

        if let Err(e) = self.transport.leave().await {
            warn!(error = %e, key = %self.session_key, "Presence withdrawal failed");
        }

        info!(
            participant = %self.participant_id,
            key = %self.session_key,
            "Cursor sharing disabled"
        );
        result
    }

    /// Flips sharing on or off and returns the new state.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`enable`](Self::enable) or
    /// [`disable`](Self::disable).
    pub async fn toggle_cursor_sharing(&mut self) -> Result<bool> {
        if self.is_enabled() {
            self.disable().await?;
        } else {
            self.enable().await?;
        }
        Ok(self.is_enabled())
    }

    /// Hands a local pointer move to the session. Ignored while disabled.
    pub fn pointer_move(&self, event: PointerMove) {
        let Some(running) = &self.running else {
            return;
        };

        let captured = CapturedPosition {
            at: Instant::now(),
            position: resolve(self.document.as_ref(), event.viewport, event.page),
        };
        if running.pointer_tx.send(captured).is_err() {
            debug!("Session loop gone; pointer move dropped");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.control_tx.send(Control::Shutdown);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            running.publisher.abort();
            return;
        };

        let transport = Arc::clone(&self.transport);
        let mut publisher = running.publisher;
        handle.spawn(async move {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut publisher).await.is_err() {
                publisher.abort();
            }
            if let Err(e) = transport.leave().await {
                warn!(error = %e, "Presence withdrawal failed on drop");
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

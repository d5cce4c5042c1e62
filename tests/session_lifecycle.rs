//! End-to-end session lifecycle tests.
//!
//! Drive real controllers over in-process and WebSocket transports with
//! paused tokio time where timing matters.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cursor_sync::{
    Batch, CommandLog, ElementSpec, Error, LocalHub, MemoryDocument, ParticipantId, PointerMove,
    PresenceMeta, Rect, RelayServer, RenderCommand, SessionConfig, SessionController, SessionKey,
    Transport, TransportEvent, WsTransport,
};
use tokio::sync::mpsc;

const PAGE: &str = "https://example.com/board#section-2";

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build(
    name: &str,
    transport: Arc<dyn Transport>,
    document: Arc<MemoryDocument>,
    log: &CommandLog,
) -> Result<SessionController> {
    Ok(SessionController::builder()
        .page_url(PAGE)
        .config(SessionConfig::new().with_name(name))
        .participant_id(ParticipantId::new(name))
        .transport(transport)
        .document(document)
        .renderer(log.clone())
        .build()?)
}

fn hub_session(
    hub: &Arc<LocalHub>,
    name: &str,
    document: Arc<MemoryDocument>,
    log: &CommandLog,
) -> Result<SessionController> {
    let key = SessionKey::for_page(PAGE, "cursors")?;
    let transport = Arc::new(hub.connect(key, ParticipantId::new(name)));
    build(name, transport, document, log)
}

// ============================================================================
// Failing transport
// ============================================================================

/// Subscribes fine, fails everything else.
#[derive(Default)]
struct FlakyTransport {
    publish_attempts: AtomicUsize,
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn publish(&self, _batch: &Batch) -> cursor_sync::Result<()> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::transport("relay unavailable"))
    }

    async fn enter(&self, _meta: PresenceMeta) -> cursor_sync::Result<()> {
        Err(Error::transport_timeout(5_000))
    }

    async fn leave(&self) -> cursor_sync::Result<()> {
        Err(Error::ConnectionClosed)
    }

    async fn presence(&self) -> cursor_sync::Result<Vec<PresenceMeta>> {
        Err(Error::transport("presence unavailable"))
    }

    async fn subscribe(&self) -> cursor_sync::Result<mpsc::UnboundedReceiver<TransportEvent>> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(rx)
    }
}

/// Refuses to subscribe.
struct UnreachableTransport;

#[async_trait]
impl Transport for UnreachableTransport {
    async fn publish(&self, _batch: &Batch) -> cursor_sync::Result<()> {
        Ok(())
    }

    async fn enter(&self, _meta: PresenceMeta) -> cursor_sync::Result<()> {
        Ok(())
    }

    async fn leave(&self) -> cursor_sync::Result<()> {
        Ok(())
    }

    async fn presence(&self) -> cursor_sync::Result<Vec<PresenceMeta>> {
        Ok(Vec::new())
    }

    async fn subscribe(&self) -> cursor_sync::Result<mpsc::UnboundedReceiver<TransportEvent>> {
        Err(Error::ConnectionClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_anchored_cursor_follows_reflowed_layout() -> Result<()> {
    init_tracing();
    let hub = LocalHub::new();

    // Same content, different layout on each side.
    let wide = Arc::new(MemoryDocument::new(1600.0, 900.0));
    wide.append(
        wide.body(),
        ElementSpec::new("section")
            .id("notes")
            .rect(Rect::new(800.0, 100.0, 400.0, 200.0)),
    );
    let narrow = Arc::new(MemoryDocument::new(400.0, 1800.0));
    narrow.append(
        narrow.body(),
        ElementSpec::new("section")
            .id("notes")
            .rect(Rect::new(0.0, 600.0, 400.0, 200.0)),
    );

    let sender_log = CommandLog::new();
    let viewer_log = CommandLog::new();
    let mut viewer = hub_session(&hub, "viewer", narrow, &viewer_log)?;
    let mut sender = hub_session(&hub, "sender", wide, &sender_log)?;

    viewer.enable().await?;
    sender.enable().await?;

    // Center of #notes on the wide layout.
    sender.pointer_move(PointerMove::unscrolled(1000.0, 200.0));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let updates = viewer_log.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!((updates[0].x, updates[0].y), (200.0, 700.0));

    sender.disable().await?;
    viewer.disable().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_disable_twice_leaves_nothing_behind() -> Result<()> {
    let hub = LocalHub::new();
    let a_log = CommandLog::new();
    let b_log = CommandLog::new();
    let doc = Arc::new(MemoryDocument::new(800.0, 600.0));
    let mut a = hub_session(&hub, "a", Arc::clone(&doc), &a_log)?;
    let mut b = hub_session(&hub, "b", doc, &b_log)?;

    a.enable().await?;
    b.enable().await?;

    // A batch from `b` is scheduled on `a` but not yet replayed when `a` stops.
    b.pointer_move(PointerMove::unscrolled(1.0, 1.0));
    tokio::time::sleep(Duration::from_millis(20)).await;
    b.pointer_move(PointerMove::unscrolled(2.0, 2.0));
    tokio::time::sleep(Duration::from_millis(85)).await;

    a.disable().await?;
    let after_first = a_log.commands();
    a.disable().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(a_log.commands(), after_first);
    assert!(a_log.live_cursors().is_empty());
    assert!(!a.is_enabled());

    b.disable().await?;
    assert_eq!(hub.room_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_present_participant_leaves_before_any_batch() -> Result<()> {
    let hub = LocalHub::new();
    let doc = Arc::new(MemoryDocument::new(800.0, 600.0));
    let ghost_log = CommandLog::new();
    let observer_log = CommandLog::new();

    let mut ghost = hub_session(&hub, "ghost", Arc::clone(&doc), &ghost_log)?;
    ghost.enable().await?;

    let mut observer = hub_session(&hub, "observer", doc, &observer_log)?;
    observer.enable().await?;

    ghost.disable().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let ghost_id = ParticipantId::new("ghost");
    assert_eq!(
        observer_log.commands(),
        vec![
            RenderCommand::Create {
                participant_id: ghost_id.clone(),
                color: cursor_sync::Rgb::from_seed("ghost"),
            },
            RenderCommand::Destroy {
                participant_id: ghost_id,
            },
        ]
    );

    observer.disable().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failing_transport_does_not_stop_capture() -> Result<()> {
    let transport = Arc::new(FlakyTransport::default());
    let log = CommandLog::new();
    let mut session = build(
        "solo",
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(MemoryDocument::new(800.0, 600.0)),
        &log,
    )?;

    // Presence and enter failures are logged, not fatal.
    session.enable().await?;

    for i in 0..3 {
        session.pointer_move(PointerMove::unscrolled(f64::from(i), 0.0));
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    assert_eq!(transport.publish_attempts.load(Ordering::SeqCst), 3);
    assert!(session.is_enabled());

    // Leave failure is logged too.
    session.disable().await?;
    assert!(!session.is_enabled());
    Ok(())
}

#[tokio::test]
async fn test_subscribe_failure_rejects_enable() -> Result<()> {
    let log = CommandLog::new();
    let mut session = build(
        "solo",
        Arc::new(UnreachableTransport),
        Arc::new(MemoryDocument::new(800.0, 600.0)),
        &log,
    )?;

    let err = session.enable().await.expect_err("subscribe fails");
    assert!(err.is_transport_error());
    assert!(!session.is_enabled());

    // The renderer is kept, so a later attempt is still possible.
    let err = session.enable().await.expect_err("still failing");
    assert!(matches!(err, Error::ConnectionClosed));
    Ok(())
}

#[tokio::test]
async fn test_sessions_over_websocket_relay() -> Result<()> {
    init_tracing();
    let relay = RelayServer::new().await?;
    let key = SessionKey::for_page(PAGE, "cursors")?;
    let doc = Arc::new(MemoryDocument::new(800.0, 600.0));

    let a_log = CommandLog::new();
    let b_log = CommandLog::new();

    let url = relay.ws_url();
    let a_transport = WsTransport::connect(&url, key.clone(), ParticipantId::new("a")).await?;
    let b_transport = WsTransport::connect(&url, key.clone(), ParticipantId::new("b")).await?;

    let mut a = build("a", Arc::new(a_transport), Arc::clone(&doc), &a_log)?;
    let mut b = build("b", Arc::new(b_transport), doc, &b_log)?;

    b.enable().await?;
    a.enable().await?;
    assert_eq!(relay.present(&key).len(), 2);

    a.pointer_move(PointerMove::unscrolled(40.0, 30.0));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while b_log.updates().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let updates = b_log.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].participant_id.as_str(), "a");
    assert!((updates[0].x - 40.0).abs() < 1e-9);
    assert!((updates[0].y - 30.0).abs() < 1e-9);

    a.disable().await?;
    b.disable().await?;
    assert!(relay.present(&key).is_empty());

    relay.shutdown();
    Ok(())
}

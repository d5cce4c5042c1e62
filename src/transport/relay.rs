//! WebSocket relay server.
//!
//! Accepts [`WsTransport`](super::WsTransport) clients on one port and routes
//! their traffic by session key. Each client attaches to a room, then
//! publishes batches and presence changes that the relay fans out to the
//! other members of that room.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              RelayServer                │
//! │              (single port)              │
//! │  ┌───────────────────────────────────┐  │
//! │  │ "cursors:page-a" → {alice, bob}   │  │
//! │  │ "cursors:page-b" → {carol}        │  │
//! │  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! When a socket closes, the relay removes the member and, if it was present,
//! sends `presence.left` to the rest of the room.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, json, to_string};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ParticipantId, SessionKey};
use crate::protocol::{
    Command, Event, INVALID_ARGUMENT, PROTOCOL_ERROR, PresenceMeta, Request, Response,
    UNKNOWN_ERROR,
};

// ============================================================================
// Constants
// ============================================================================

/// Default bind address for the relay (localhost).
const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// How often the accept loop checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Types
// ============================================================================

type Outbox = mpsc::UnboundedSender<Message>;

struct Member {
    outbox: Outbox,
    meta: Option<PresenceMeta>,
}

#[derive(Default)]
struct Room {
    members: FxHashMap<ParticipantId, Member>,
}

impl Room {
    fn broadcast(&self, from: &ParticipantId, event: &Event) -> Result<()> {
        let text = to_string(event)?;
        for (participant_id, member) in &self.members {
            if participant_id != from {
                let _ = member.outbox.send(Message::Text(text.clone().into()));
            }
        }
        Ok(())
    }
}

/// Identity a client established with `session.attach`.
#[derive(Clone)]
struct Attachment {
    session_key: SessionKey,
    participant_id: ParticipantId,
}

// ============================================================================
// RelayServer
// ============================================================================

/// Fan-out relay for [`WsTransport`](super::WsTransport) clients.
///
/// # Example
///
/// ```ignore
/// let relay = RelayServer::new().await?;
/// let transport = WsTransport::connect(&relay.ws_url(), key, participant).await?;
/// ```
pub struct RelayServer {
    /// Bound port.
    port: u16,

    /// Rooms by session key.
    rooms: RwLock<FxHashMap<SessionKey, Room>>,

    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// RelayServer - Constructor
// ============================================================================

impl RelayServer {
    /// Binds to `localhost:0` (random available port) and starts accepting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn new() -> Result<Arc<Self>> {
        Self::with_ip_port(DEFAULT_BIND_IP, 0).await
    }

    /// Binds to a specific port on localhost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn with_port(port: u16) -> Result<Arc<Self>> {
        Self::with_ip_port(DEFAULT_BIND_IP, port).await
    }

    /// Binds to a specific IP and port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn with_ip_port(ip: IpAddr, port: u16) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let actual_port = listener.local_addr()?.port();

        let relay = Arc::new(Self {
            port: actual_port,
            rooms: RwLock::new(FxHashMap::default()),
            shutdown: AtomicBool::new(false),
        });

        let relay_clone = Arc::clone(&relay);
        tokio::spawn(async move {
            relay_clone.accept_loop(listener).await;
        });

        info!(port = actual_port, "RelayServer started");

        Ok(relay)
    }
}

// ============================================================================
// RelayServer - Public API
// ============================================================================

impl RelayServer {
    /// Returns the WebSocket URL, `ws://127.0.0.1:{port}`.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of rooms with at least one attached client.
    #[inline]
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
            .map(|room| {
                room.members
                    .values()
                    .filter_map(|member| member.meta.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stops accepting and forgets every room.
    ///
    /// Connected clients stay open until they disconnect, but no longer
    /// receive fan-out.
    pub fn shutdown(&self) {
        info!("RelayServer shutting down");
        self.shutdown.store(true, Ordering::SeqCst);
        self.rooms.write().clear();
    }
}

// ============================================================================
// RelayServer - Accept Loop
// ============================================================================

impl RelayServer {
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Accept loop shutting down");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let relay = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = relay.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::transport(format!("WebSocket upgrade failed: {e}")))?;

        debug!(?addr, "Client connected");

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = outbox_rx.recv().await {
                if let Err(e) = ws_write.send(message).await {
                    debug!(error = %e, "Client write failed");
                    break;
                }
            }
            let _ = ws_write.close().await;
        });

        let mut attachment: Option<Attachment> = None;

        while let Some(message) = ws_read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let response = match from_str::<Request>(&text) {
                        Ok(request) => self.handle_request(request, &outbox, &mut attachment),
                        Err(e) => {
                            warn!(error = %e, ?addr, "Malformed request");
                            continue;
                        }
                    };
                    let _ = outbox.send(Message::Text(to_string(&response)?.into()));
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, ?addr, "Client read failed");
                    break;
                }
            }
        }

        if let Some(attachment) = attachment {
            self.detach(&attachment)?;
        }
        drop(outbox);
        let _ = writer.await;

        debug!(?addr, "Client disconnected");
        Ok(())
    }
}

// ============================================================================
// RelayServer - Commands
// ============================================================================

impl RelayServer {
    fn handle_request(
        &self,
        request: Request,
        outbox: &Outbox,
        attachment: &mut Option<Attachment>,
    ) -> Response {
        let id = request.id;
        trace!(method = request.command.method(), "Relay request");

        match self.execute(request.command, outbox, attachment) {
            Ok(result) => Response::success(id, result),
            Err(e) => Response::error(id, error_code(&e), e.to_string()),
        }
    }

    fn execute(
        &self,
        command: Command,
        outbox: &Outbox,
        attachment: &mut Option<Attachment>,
    ) -> Result<Value> {
        if let Command::Attach {
            session_key,
            participant_id,
        } = command
        {
            if let Some(previous) = attachment.take() {
                self.detach(&previous)?;
            }
            self.rooms
                .write()
                .entry(session_key.clone())
                .or_default()
                .members
                .insert(
                    participant_id.clone(),
                    Member {
                        outbox: outbox.clone(),
                        meta: None,
                    },
                );
            info!(participant = %participant_id, key = %session_key, "Client attached");
            *attachment = Some(Attachment {
                session_key,
                participant_id,
            });
            return Ok(json!({}));
        }

        let Some(current) = attachment.as_ref() else {
            return Err(Error::protocol("session.attach must come first"));
        };

        let mut rooms = self.rooms.write();
        let Some(room) = rooms.get_mut(&current.session_key) else {
            return Err(Error::protocol("Session no longer exists"));
        };

        match command {
            Command::Attach { .. } => Ok(json!({})),
            Command::Enter { mut meta } => {
                meta.participant_id = current.participant_id.clone();
                if let Some(member) = room.members.get_mut(&current.participant_id) {
                    member.meta = Some(meta.clone());
                }
                room.broadcast(&current.participant_id, &Event::joined(&meta)?)?;
                Ok(json!({}))
            }
            Command::Leave => {
                let was_present = room
                    .members
                    .get_mut(&current.participant_id)
                    .and_then(|member| member.meta.take())
                    .is_some();
                if was_present {
                    let event = Event::left(&current.participant_id);
                    room.broadcast(&current.participant_id, &event)?;
                }
                Ok(json!({}))
            }
            Command::GetPresence => {
                let participants: Vec<&PresenceMeta> = room
                    .members
                    .values()
                    .filter_map(|member| member.meta.as_ref())
                    .collect();
                Ok(json!({ "participants": participants }))
            }
            Command::Publish { batch } => {
                if batch.participant_id != current.participant_id {
                    return Err(Error::protocol("Batch participant does not match attachment"));
                }
                room.broadcast(&current.participant_id, &Event::batch(&batch)?)?;
                Ok(json!({}))
            }
        }
    }

    /// Removes a member, announcing its departure if it was present.
    fn detach(&self, attachment: &Attachment) -> Result<()> {
        let mut rooms = self.rooms.write();
        let Some(room) = rooms.get_mut(&attachment.session_key) else {
            return Ok(());
        };

        let removed = room.members.remove(&attachment.participant_id);
        if removed.is_some_and(|member| member.meta.is_some()) {
            room.broadcast(
                &attachment.participant_id,
                &Event::left(&attachment.participant_id),
            )?;
        }
        if room.members.is_empty() {
            rooms.remove(&attachment.session_key);
        }

        debug!(
            participant = %attachment.participant_id,
            key = %attachment.session_key,
            "Client detached"
        );
        Ok(())
    }
}

fn error_code(error: &Error) -> &'static str {
    match error {
        Error::Protocol { .. } => PROTOCOL_ERROR,
        Error::Json(_) => INVALID_ARGUMENT,
        _ => UNKNOWN_ERROR,
    }
}

// ============================================================================
// Tests
// ============================================================================

//! WebSocket client transport.
//!
//! Talks to a [`RelayServer`](super::RelayServer). Calls are serialized on
//! the caller's task and registered in [`PendingCalls`] before the frame is
//! queued; a background link task owns the socket, writes queued frames,
//! settles replies and pushes relay events to the current subscriber. When
//! the socket goes away every unanswered call fails with
//! [`Error::ConnectionClosed`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{ParticipantId, RequestId, SessionKey};
use crate::protocol::{Batch, Command, Event, ParsedEvent, PresenceMeta, Request, Response};

use super::{Transport, TransportEvent};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Unanswered calls allowed at once. A relay this far behind is treated as
/// unavailable rather than queued against.
const MAX_IN_FLIGHT: usize = 100;

// ============================================================================
// PendingCalls
// ============================================================================

type Reply = oneshot::Sender<Result<Response>>;

/// Calls waiting for a relay reply, keyed by request id.
#[derive(Default)]
struct PendingCalls {
    calls: Mutex<FxHashMap<RequestId, Reply>>,
}

impl PendingCalls {
    fn register(&self, id: RequestId, reply: Reply) -> Result<()> {
        let mut calls = self.calls.lock();
        if calls.len() >= MAX_IN_FLIGHT {
            warn!(in_flight = calls.len(), "Relay not keeping up; call refused");
            return Err(Error::transport(format!(
                "{} relay calls already in flight",
                calls.len()
            )));
        }
        calls.insert(id, reply);
        Ok(())
    }

    /// Hands a reply to its caller. Late replies to timed-out calls land here
    /// too and are dropped.
    fn settle(&self, response: Response) {
        match self.calls.lock().remove(&response.id) {
            Some(reply) => {
                let _ = reply.send(Ok(response));
            }
            None => trace!(id = %response.id, "Reply for a call nobody awaits"),
        }
    }

    fn fail(&self, id: RequestId, error: Error) {
        if let Some(reply) = self.calls.lock().remove(&id) {
            let _ = reply.send(Err(error));
        }
    }

    fn forget(&self, id: RequestId) {
        self.calls.lock().remove(&id);
    }

    fn fail_all(&self) {
        let orphaned: Vec<Reply> = self.calls.lock().drain().map(|(_, reply)| reply).collect();
        if !orphaned.is_empty() {
            debug!(count = orphaned.len(), "Failing calls left on a closed link");
        }
        for reply in orphaned {
            let _ = reply.send(Err(Error::ConnectionClosed));
        }
    }

    fn len(&self) -> usize {
        self.calls.lock().len()
    }
}

// ============================================================================
// Link
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Subscriber = Arc<Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>>;

/// Work for the link task.
enum Outbound {
    Frame { id: RequestId, text: String },
    Close,
}

/// Socket side of a [`WsTransport`], run on its own task.
struct Link {
    socket: WsStream,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    pending: Arc<PendingCalls>,
    subscriber: Subscriber,
}

impl Link {
    async fn run(self) {
        let Self {
            socket,
            mut outbound,
            pending,
            subscriber,
        } = self;
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => route(&text, &pending, &subscriber),
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Relay closed the link");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Relay link failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                },

                work = outbound.recv() => match work {
                    Some(Outbound::Frame { id, text }) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            pending.fail(id, Error::transport(format!("send failed: {e}")));
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = sink.close().await;
                        break;
                    }
                },
            }
        }

        pending.fail_all();
        // Dropping the sender ends the subscription stream.
        subscriber.lock().take();
        debug!("Relay link stopped");
    }
}

/// Dispatches one text frame: replies settle calls, events go to the
/// subscriber.
fn route(text: &str, pending: &PendingCalls, subscriber: &Subscriber) {
    if let Ok(response) = serde_json::from_str::<Response>(text) {
        pending.settle(response);
        return;
    }

    let Ok(event) = serde_json::from_str::<Event>(text) else {
        warn!(frame = %text, "Unreadable frame from relay");
        return;
    };

    let event = match event.parse() {
        ParsedEvent::CursorBatch(batch) => TransportEvent::Batch(batch),
        ParsedEvent::PresenceJoined(meta) => TransportEvent::Joined(meta),
        ParsedEvent::PresenceLeft { participant_id } => TransportEvent::Left(participant_id),
        ParsedEvent::Unknown { method, .. } => {
            trace!(%method, "Skipping unknown relay event");
            return;
        }
    };

    if let Some(tx) = subscriber.lock().as_ref() {
        let _ = tx.send(event);
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// [`Transport`] over a WebSocket link to a relay.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Arc<PendingCalls>,
    subscriber: Subscriber,
    participant_id: ParticipantId,
    request_timeout: Duration,
}

impl WsTransport {
    /// Opens a link to the relay at `url` and attaches to `session_key` as
    /// `participant_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `url` is invalid
    /// - [`Error::WebSocket`] if the handshake fails
    /// - [`Error::Protocol`] if the relay refuses the attachment
    pub async fn connect(
        url: &str,
        session_key: SessionKey,
        participant_id: ParticipantId,
    ) -> Result<Self> {
        let url = Url::parse(url)?;
        let (socket, _) = connect_async(url.as_str()).await?;
        debug!(%url, participant = %participant_id, "Linked to relay");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingCalls::default());
        let subscriber: Subscriber = Arc::new(Mutex::new(None));

        tokio::spawn(
            Link {
                socket,
                outbound: outbound_rx,
                pending: Arc::clone(&pending),
                subscriber: Arc::clone(&subscriber),
            }
            .run(),
        );

        let transport = Self {
            outbound,
            pending,
            subscriber,
            participant_id: participant_id.clone(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        transport
            .call(Command::Attach {
                session_key,
                participant_id,
            })
            .await?;

        Ok(transport)
    }

    /// Sets how long a relay call may stay unanswered.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Participant this link is attached as.
    #[inline]
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Relay calls still waiting for a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Closes the link. Unanswered calls fail with
    /// [`Error::ConnectionClosed`].
    pub fn shutdown(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    async fn call(&self, command: Command) -> Result<Value> {
        let method = command.method();
        let request = Request::new(command);
        let id = request.id;
        let text = serde_json::to_string(&request)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.register(id, reply_tx)?;

        if self.outbound.send(Outbound::Frame { id, text }).is_err() {
            self.pending.forget(id);
            return Err(Error::ConnectionClosed);
        }
        trace!(%id, method, "Relay call sent");

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            // A reply sender dropped without answering surfaces as ChannelClosed.
            Ok(reply) => reply??.into_result(),
            Err(_) => {
                self.pending.forget(id);
                Err(Error::request_timeout(
                    id,
                    self.request_timeout.as_millis() as u64,
                ))
            }
        }
    }
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport")
            .field("participant_id", &self.participant_id)
            .field("pending", &self.pending_count())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn publish(&self, batch: &Batch) -> Result<()> {
        self.call(Command::Publish {
            batch: batch.clone(),
        })
        .await
        .map(drop)
    }

    async fn enter(&self, meta: PresenceMeta) -> Result<()> {
        self.call(Command::Enter { meta }).await.map(drop)
    }

    async fn leave(&self) -> Result<()> {
        self.call(Command::Leave).await.map(drop)
    }

    async fn presence(&self) -> Result<Vec<PresenceMeta>> {
        let mut result = self.call(Command::GetPresence).await?;
        let participants = result
            .get_mut("participants")
            .map(Value::take)
            .ok_or_else(|| Error::protocol("presence.get reply has no participants"))?;
        Ok(serde_json::from_value(participants)?)
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        if self.outbound.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock() = Some(tx);
        Ok(rx)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tokio_test::assert_err;

    use super::*;
    use crate::color::Rgb;
    use crate::transport::RelayServer;

    fn key() -> SessionKey {
        SessionKey::from_raw("cursors:http%3A%2F%2Flocalhost%2F")
    }

    async fn client(relay: &RelayServer, name: &str) -> WsTransport {
        WsTransport::connect(&relay.ws_url(), key(), ParticipantId::new(name))
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn test_pending_calls_refuse_past_limit() {
        let pending = PendingCalls::default();
        for _ in 0..MAX_IN_FLIGHT {
            let (tx, _rx) = oneshot::channel();
            pending.register(RequestId::generate(), tx).expect("room left");
        }

        let (tx, _rx) = oneshot::channel();
        let err = pending.register(RequestId::generate(), tx).expect_err("full");
        assert!(err.is_recoverable());
        assert_eq!(pending.len(), MAX_IN_FLIGHT);
    }

    #[tokio::test]
    async fn test_pending_calls_settle_and_fail_all() {
        let pending = PendingCalls::default();
        let answered = RequestId::generate();
        let (answered_tx, answered_rx) = oneshot::channel();
        let (orphan_tx, orphan_rx) = oneshot::channel();
        pending.register(answered, answered_tx).expect("register");
        pending.register(RequestId::generate(), orphan_tx).expect("register");

        pending.settle(Response::success(answered, Value::Null));
        // A late duplicate is dropped quietly.
        pending.settle(Response::success(answered, Value::Null));
        assert!(answered_rx.await.expect("reply").is_ok());

        pending.fail_all();
        assert!(matches!(
            orphan_rx.await.expect("reply"),
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let result = WsTransport::connect("not a url", key(), ParticipantId::new("a")).await;
        assert!(matches!(assert_err!(result), Error::Url(_)));
    }

    #[tokio::test]
    async fn test_relay_round_trip() {
        let relay = RelayServer::new().await.expect("relay");
        let alice = client(&relay, "alice").await;
        let bob = client(&relay, "bob").await;

        let mut bob_rx = bob.subscribe().await.expect("subscribe");

        let meta = PresenceMeta::new(ParticipantId::new("alice"), Rgb::new(1, 2, 3));
        alice.enter(meta.clone()).await.expect("enter");
        assert_eq!(bob_rx.recv().await, Some(TransportEvent::Joined(meta.clone())));
        assert_eq!(bob.presence().await.expect("presence"), vec![meta]);

        let batch = Batch {
            participant_id: ParticipantId::new("alice"),
            base_timestamp: 42,
            seq: 0,
            samples: Vec::new(),
            presence_color: Rgb::new(1, 2, 3),
        };
        alice.publish(&batch).await.expect("publish");
        assert_eq!(bob_rx.recv().await, Some(TransportEvent::Batch(batch)));

        drop(alice);
        assert_eq!(
            bob_rx.recv().await,
            Some(TransportEvent::Left(ParticipantId::new("alice")))
        );

        relay.shutdown();
    }

    #[tokio::test]
    async fn test_publish_with_foreign_participant_rejected() {
        let relay = RelayServer::new().await.expect("relay");
        let alice = client(&relay, "alice").await;

        let batch = Batch {
            participant_id: ParticipantId::new("mallory"),
            base_timestamp: 1,
            seq: 0,
            samples: Vec::new(),
            presence_color: Rgb::default(),
        };
        let err = alice.publish(&batch).await.expect_err("rejected");
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("does not match"));
        assert_eq!(alice.pending_count(), 0);

        relay.shutdown();
    }
}

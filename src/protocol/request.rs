//! Relay call envelopes.
//!
//! A client call travels as a [`Request`]; the relay answers each one with a
//! single [`Response`] carrying the same `id`. Pushed traffic (batches and
//! presence changes) uses [`Event`](super::Event) instead.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Command;

/// Error code for a request the relay could not accept in the current state.
pub const PROTOCOL_ERROR: &str = "protocol error";

/// Error code for params that failed to decode.
pub const INVALID_ARGUMENT: &str = "invalid argument";

/// Error code for anything else.
pub const UNKNOWN_ERROR: &str = "unknown error";

// ============================================================================
// Request
// ============================================================================

/// One call from a [`WsTransport`](crate::transport::WsTransport) to the relay.
///
/// ```json
/// { "id": "…", "method": "cursor.publish", "params": { "batch": { … } } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlates the reply.
    pub id: RequestId,

    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Wraps `command` under a fresh id.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// The relay's answer to one [`Request`].
///
/// Failures carry a short `error` code (see [`PROTOCOL_ERROR`] and friends)
/// and a readable `message`:
///
/// ```json
/// { "id": "…", "type": "error", "error": "protocol error", "message": "session.attach must come first" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,

    #[serde(rename = "type")]
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// Accepts the call identified by `id`.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            status: Status::Success,
            result: Some(result),
            error: None,
            message: None,
        }
    }

    /// Rejects the call identified by `id`.
    #[must_use]
    pub fn error(id: RequestId, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::Error,
            result: None,
            error: Some(code.into()),
            message: Some(message.into()),
        }
    }

    /// Returns `true` if the relay accepted the call.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Success
    }

    /// Unwraps the payload of an accepted call.
    ///
    /// A missing payload reads as `null`.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] when the relay reports [`PROTOCOL_ERROR`]
    /// - [`Error::Transport`] for every other rejection
    pub fn into_result(self) -> Result<Value> {
        if self.status == Status::Success {
            return Ok(self.result.unwrap_or(Value::Null));
        }

        let code = self.error.as_deref().unwrap_or(UNKNOWN_ERROR);
        let message = self.message.as_deref().unwrap_or(code);
        if code == PROTOCOL_ERROR {
            Err(Error::protocol(message))
        } else {
            Err(Error::transport(format!("{code}: {message}")))
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Whether the relay accepted a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_flattens_command() {
        let request = Request::new(Command::GetPresence);
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["method"], "presence.get");
        assert_eq!(value["id"], json!(request.id));
    }

    #[test]
    fn test_request_decodes_from_wire() {
        let request = Request::new(Command::Leave);
        let wire = serde_json::to_string(&request).expect("serialize");
        let decoded: Request = serde_json::from_str(&wire).expect("deserialize");

        assert_eq!(decoded.id, request.id);
        assert_eq!(decoded.command, Command::Leave);
    }

    #[test]
    fn test_presence_reply_yields_payload() {
        let reply: Response = serde_json::from_value(json!({
            "id": RequestId::generate(),
            "type": "success",
            "result": { "participants": [] }
        }))
        .expect("parse");

        assert!(reply.is_ok());
        let payload = reply.into_result().expect("accepted");
        assert!(payload["participants"].is_array());
    }

    #[test]
    fn test_accepted_without_payload_is_null() {
        let reply = Response {
            result: None,
            ..Response::success(RequestId::generate(), Value::Null)
        };
        assert_eq!(reply.into_result().expect("accepted"), Value::Null);
    }

    #[test]
    fn test_protocol_rejection_maps_to_protocol_error() {
        let reply = Response::error(
            RequestId::generate(),
            PROTOCOL_ERROR,
            "session.attach must come first",
        );
        let wire = serde_json::to_value(&reply).expect("serialize");
        assert_eq!(wire["type"], "error");
        assert!(wire.get("result").is_none());

        let err = reply.into_result().expect_err("rejected");
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("attach must come first"));
    }

    #[test]
    fn test_other_rejection_maps_to_transport_error() {
        let reply = Response::error(RequestId::generate(), INVALID_ARGUMENT, "bad batch");
        let err = reply.into_result().expect_err("rejected");
        assert!(err.is_transport_error());
        assert!(err.to_string().contains("invalid argument: bad batch"));
    }

    #[test]
    fn test_event_frame_is_not_a_response() {
        let frame = json!({ "type": "event", "method": "presence.left", "params": {} });
        assert!(serde_json::from_value::<Response>(frame).is_err());
    }
}

//! Inbound protocol errors.
//!
//! None of these are ever sent to a client. They exist so the discard path
//! can log and count why a frame was dropped.

use thiserror::Error;

/// Why an inbound frame was discarded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame had no `type`, or one this server does not handle.
    #[error("unrecognized message type: {0:?}")]
    UnknownType(Option<String>),

    /// The `type` was recognized but the payload did not fit it.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// Message type being parsed.
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The message needs a bound identity and the connection has none.
    #[error("{kind} received before hello")]
    Unbound {
        /// Message type that was dropped.
        kind: &'static str,
    },

    /// The connection is no longer in the registry (evicted or closing).
    #[error("{kind} received on an unregistered connection")]
    Unregistered {
        /// Message type that was dropped.
        kind: &'static str,
    },
}

impl ProtocolError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::UnknownType(_) => "unknown_type",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::Unbound { .. } => "unbound",
            Self::Unregistered { .. } => "unregistered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_display() {
        let err = ProtocolError::UnknownType(Some("teleport".into()));
        assert_eq!(err.to_string(), "unrecognized message type: Some(\"teleport\")");
    }

    #[test]
    fn invalid_payload_display() {
        let err = ProtocolError::InvalidPayload {
            kind: "hello",
            reason: "empty mcUuid".into(),
        };
        assert_eq!(err.to_string(), "invalid hello payload: empty mcUuid");
    }

    #[test]
    fn unbound_display() {
        let err = ProtocolError::Unbound { kind: "heartbeat" };
        assert_eq!(err.to_string(), "heartbeat received before hello");
    }

    #[test]
    fn labels_are_snake_case() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let errs = [
            ProtocolError::InvalidJson(json_err),
            ProtocolError::UnknownType(None),
            ProtocolError::InvalidPayload { kind: "hello", reason: String::new() },
            ProtocolError::Unbound { kind: "heartbeat" },
            ProtocolError::Unregistered { kind: "set_tracker_flag" },
        ];
        for err in &errs {
            assert!(err.label().chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}

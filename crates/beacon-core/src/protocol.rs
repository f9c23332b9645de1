//! JSON wire protocol.
//!
//! Inbound frames are parsed in two steps: first as a map of raw fields to
//! read the `type` tag, then into the matching typed payload. This keeps
//! "unknown type" and "bad payload" distinguishable in logs.
//!
//! Field values stay unparsed until the typed step, so an out-of-range
//! number only fails the field that carries it.

use std::collections::HashMap;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::errors::ProtocolError;
use crate::ids::IdentityId;
use crate::presence::Coords;
use crate::visibility::PublicView;

/// `hello`: claim an identity and declare the tracking capability.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    /// Identity being claimed.
    pub mc_uuid: IdentityId,
    /// Display name.
    #[serde(default)]
    pub mc_name: String,
    /// Server the player is on.
    #[serde(default)]
    pub server: Option<String>,
    /// Opaque client value.
    #[serde(default)]
    pub client_nonce: Option<Value>,
    /// Declared tracking capability.
    #[serde(default)]
    pub has_tracker: bool,
}

/// `heartbeat`: refresh liveness and report location.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// New server, or keep the previous one.
    #[serde(default)]
    pub server: Option<String>,
    /// New dimension, or keep the previous one.
    #[serde(default)]
    pub dimension: Option<String>,
    /// Reported position. Absent, partial, mistyped, or non-finite
    /// coordinates all read as `None`.
    #[serde(default, deserialize_with = "lenient_coords")]
    pub coords: Option<Coords>,
}

fn lenient_coords<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Coords>, D::Error> {
    let raw = Option::<Box<RawValue>>::deserialize(de)?;
    Ok(raw
        .and_then(|raw| serde_json::from_str::<Value>(raw.get()).ok())
        .as_ref()
        .and_then(Coords::from_value))
}

/// `set_tracker_flag`: change the declared tracking capability.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTrackerFlag {
    /// New capability.
    pub has_tracker: bool,
}

/// A recognized client → server message.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// See [`Hello`].
    Hello(Hello),
    /// See [`Heartbeat`].
    Heartbeat(Heartbeat),
    /// See [`SetTrackerFlag`].
    SetTrackerFlag(SetTrackerFlag),
}

impl InboundMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello(_) => "hello",
            Self::Heartbeat(_) => "heartbeat",
            Self::SetTrackerFlag(_) => "set_tracker_flag",
        }
    }

    /// Parse an inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let _: IgnoredAny = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
        let kind = serde_json::from_str::<HashMap<String, Box<RawValue>>>(text)
            .ok()
            .and_then(|fields| fields.get("type").map(|raw| raw.get().to_owned()))
            .and_then(|raw| serde_json::from_str::<String>(&raw).ok());
        match kind.as_deref() {
            Some("hello") => {
                let hello: Hello = payload("hello", text)?;
                if hello.mc_uuid.is_empty() {
                    return Err(ProtocolError::InvalidPayload {
                        kind: "hello",
                        reason: "empty mcUuid".into(),
                    });
                }
                Ok(Self::Hello(hello))
            }
            Some("heartbeat") => payload("heartbeat", text).map(Self::Heartbeat),
            Some("set_tracker_flag") => {
                payload("set_tracker_flag", text).map(Self::SetTrackerFlag)
            }
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &'static str, text: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

/// A server → client message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Periodic snapshot of every visible player.
    Presence {
        /// Disclosed views, one per live record.
        players: Vec<PublicView>,
    },
    /// Acknowledges an accepted `hello`.
    HelloAck {
        /// Always `true`.
        ok: bool,
    },
}

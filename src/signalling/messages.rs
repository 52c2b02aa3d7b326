//! Message Types für den Signalling-Kanal
//!
//! Jede Nachricht ist ein einzelner Text-Frame der Form
//! `{"type": <string>, "payload": <JSON>}`. Der Kanal selbst erzeugt nur
//! `HEARTBEAT`; alle anderen Typen (Offer, Answer, ICE Candidates, ...)
//! werden unverändert durchgereicht.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Typ der Heartbeat-Nachricht
pub const HEARTBEAT: &str = "HEARTBEAT";

/// Inhalt des Heartbeat-Payloads
pub const PING: &str = "PING";

/// Raum erstellen oder betreten
pub const CREATE_OR_JOIN: &str = "CREATE_OR_JOIN";
/// SDP Offer
pub const OFFER: &str = "OFFER";
/// SDP Answer
pub const ANSWER: &str = "ANSWER";
pub const ICE_CANDIDATE: &str = "ICE_CANDIDATE";
/// Server bestätigt den Beitritt zu einem Raum
pub const ROOM_JOIN: &str = "ROOM_JOIN";

// ============================================================================
// CLIENT → SERVER MESSAGES
// ============================================================================

/// Umschlag für ausgehende Nachrichten
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub msg_type: &'a str,
    pub payload: T,
}

impl<'a, T: Serialize> OutboundMessage<'a, T> {
    pub fn new(msg_type: &'a str, payload: T) -> Self {
        Self { msg_type, payload }
    }

    /// Serialisiert die Nachricht zu einem Text-Frame
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub data: String,
}

impl HeartbeatPayload {
    pub fn ping() -> Self {
        Self {
            data: PING.to_string(),
        }
    }
}

// ============================================================================
// SERVER → CLIENT MESSAGES
// ============================================================================

/// Dekodierter Umschlag einer eingehenden Nachricht
///
/// Der Kanal reicht eingehende Frames roh an den Handler weiter. Handler
/// können `Envelope::decode` nutzen, um nach `type` zu verzweigen.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Prüft ob es sich um einen Heartbeat handelt
    pub fn is_heartbeat(&self) -> bool {
        self.msg_type == HEARTBEAT
    }

    /// Deserialisiert den Payload in einen konkreten Typ
    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

// ============================================================================
// TESTS
// ============================================================================

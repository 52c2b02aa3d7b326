//! Signalling Module - WebSocket Kanal zum Konference-Server
//!
//! Dieses Modul verwaltet die Kommunikation mit dem Signalling-Server:
//! - WebSocket-Verbindung aufbauen und halten (genau eine pro Prozess)
//! - Nachrichten als `{type, payload}` Frames senden
//! - Eingehende Frames an den registrierten Handler weiterleiten
//! - Heartbeat solange die Verbindung offen ist
//!

mod channel;
mod messages;
mod transport;

pub use channel::{
    ChannelEvent, CloseReason, ConnectionState, MessageHandler, SignallingChannel,
    SignallingError, AUTH_TOKEN_PARAM,
};
pub use messages::*;
pub use transport::{Connector, FrameSink, FrameStream, Transport, WebSocketConnector};

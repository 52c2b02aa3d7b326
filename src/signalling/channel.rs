//! Signalling-Kanal zum Konference-Server
//!
//! Hält höchstens eine WebSocket-Verbindung zum Signalling-Server:
//! - Authentifizierung über `auth_token` Query-Parameter
//! - Best-Effort Senden (kein Queueing, kein Retry)
//! - Genau ein Message-Handler für eingehende Frames
//! - Heartbeat alle 30 Sekunden solange die Verbindung offen ist
//!
//! Es gibt keine automatische Reconnection. Nach einem Verbindungsabbruch
//! muss der Aufrufer `open` erneut aufrufen.

use super::messages::{HeartbeatPayload, OutboundMessage, HEARTBEAT};
use super::transport::{Connector, FrameSink, FrameStream, WebSocketConnector};
use crate::config::SignallingConfig;
use futures::{SinkExt, StreamExt};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

/// Query-Parameter über den der Token übertragen wird
pub const AUTH_TOKEN_PARAM: &str = "auth_token";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignallingError {
    #[error("Invalid signalling endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("WebSocket handshake failed: {0}")]
    HandshakeFailed(String),
}

// ============================================================================
// STATE & EVENTS
// ============================================================================

/// Status der aktuellen Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Noch nie geöffnet
    Idle,
    /// Handshake läuft
    Connecting,
    /// Verbunden, Heartbeat läuft
    Open,
    /// Letzte Verbindung beendet, `open` ist wieder möglich
    Closed,
}

/// Warum eine Verbindung beendet wurde
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Lokal über `close()`
    Local,
    /// Close-Frame vom Server oder Stream-Ende
    Server,
    TransportError(String),
}

/// Events die vom SignallingChannel ausgelöst werden
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Closed { reason: CloseReason },
}

/// Callback für eingehende Frames (roher Text)
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

struct Connection {
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Connection {
    fn connecting(generation: u64) -> Self {
        Self {
            generation,
            outbound: None,
            reader: None,
            heartbeat: None,
        }
    }

    fn is_open(&self) -> bool {
        self.outbound.is_some()
    }

    /// Stoppt Heartbeat und Reader; der Writer endet mit dem Sender
    fn shutdown(self) {
        if let Some(heartbeat) = self.heartbeat {
            heartbeat.abort();
        }
        if let Some(reader) = self.reader {
            reader.abort();
        }
    }
}

struct ChannelState {
    connection: Option<Connection>,
    state: ConnectionState,
    next_generation: u64,
}

struct Shared {
    config: SignallingConfig,
    connector: Box<dyn Connector>,
    state: Mutex<ChannelState>,
    handler: RwLock<Option<MessageHandler>>,
    event_tx: broadcast::Sender<ChannelEvent>,
}

// ============================================================================
// SIGNALLING CHANNEL
// ============================================================================

/// Prozessweite Instanz
static CHANNEL: OnceCell<SignallingChannel> = OnceCell::new();

/// Handle auf den Signalling-Kanal (günstig klonbar)
#[derive(Clone)]
pub struct SignallingChannel {
    shared: Arc<Shared>,
}

impl SignallingChannel {
    /// Erstellt einen neuen Kanal mit WebSocket-Transport
    pub fn new(config: SignallingConfig) -> Self {
        Self::with_connector(config, WebSocketConnector)
    }

    /// Erstellt einen neuen Kanal mit eigenem Transport
    pub fn with_connector(config: SignallingConfig, connector: impl Connector) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            shared: Arc::new(Shared {
                config,
                connector: Box::new(connector),
                state: Mutex::new(ChannelState {
                    connection: None,
                    state: ConnectionState::Idle,
                    next_generation: 0,
                }),
                handler: RwLock::new(None),
                event_tx,
            }),
        }
    }

    /// Gibt die prozessweite Instanz zurück
    ///
    /// Die Konfiguration wird nur beim ersten Aufruf übernommen, spätere
    /// Aufrufe erhalten dieselbe Instanz und ignorieren ihr Argument.
    pub fn instance(config: SignallingConfig) -> &'static SignallingChannel {
        CHANNEL.get_or_init(|| {
            tracing::info!("Creating signalling channel for {}", config.endpoint());
            Self::new(config)
        })
    }

    /// Gibt die prozessweite Instanz zurück, falls bereits erstellt
    pub fn get() -> Option<&'static SignallingChannel> {
        CHANNEL.get()
    }

    pub fn endpoint(&self) -> &str {
        self.shared.config.endpoint()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Setzt den Message-Handler und ersetzt einen vorherigen
    pub fn register_on_message_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.shared.handler.write() = Some(Arc::new(handler));
    }

    /// Öffnet die Verbindung mit dem gegebenen Token
    ///
    /// Ist bereits eine Verbindung vorhanden (auch im Handshake), wird nur
    /// ein Fehler geloggt und `Ok(())` zurückgegeben. Der Heartbeat läuft
    /// bereits, wenn diese Methode erfolgreich zurückkehrt.
    pub async fn open(&self, auth_token: &str) -> Result<(), SignallingError> {
        let generation = {
            let mut state = self.shared.state.lock();
            if state.connection.is_some() {
                tracing::error!("Signalling connection already established");
                return Ok(());
            }

            let generation = state.next_generation;
            state.next_generation += 1;
            state.connection = Some(Connection::connecting(generation));
            state.state = ConnectionState::Connecting;
            generation
        };

        // Räumt den Slot, falls `open` vor OPEN endet oder verworfen wird
        let mut pending = PendingOpen {
            shared: &self.shared,
            generation,
            armed: true,
        };

        let target = match self.shared.config.websocket_endpoint() {
            Ok(mut target) => {
                target
                    .query_pairs_mut()
                    .append_pair(AUTH_TOKEN_PARAM, auth_token);
                target
            }
            Err(e) => {
                return Err(SignallingError::InvalidEndpoint(format!(
                    "{}: {}",
                    self.endpoint(),
                    e
                )));
            }
        };

        tracing::info!("Connecting to signalling server: {}", self.endpoint());

        let transport = match self.shared.connector.connect(target).await {
            Ok(transport) => transport,
            Err(e) => {
                tracing::error!("Signalling handshake failed: {}", e);
                return Err(SignallingError::HandshakeFailed(e.to_string()));
            }
        };

        {
            let mut state = self.shared.state.lock();
            let Some(connection) = state
                .connection
                .as_mut()
                .filter(|c| c.generation == generation)
            else {
                // Kann nur passieren, wenn jemand den Slot geräumt hat
                tracing::warn!("Signalling connection slot lost during handshake");
                return Err(SignallingError::HandshakeFailed(
                    "connection slot lost during handshake".to_string(),
                ));
            };

            let (tx, rx) = mpsc::unbounded_channel::<String>();
            connection.outbound = Some(tx);
            tokio::spawn(Shared::write_loop(
                Arc::clone(&self.shared),
                generation,
                transport.sink,
                rx,
            ));
            connection.reader = Some(tokio::spawn(Shared::read_loop(
                Arc::clone(&self.shared),
                generation,
                transport.stream,
            )));
            connection.heartbeat = Some(tokio::spawn(Shared::heartbeat_loop(
                Arc::clone(&self.shared),
                self.shared.config.heartbeat_interval(),
            )));
            state.state = ConnectionState::Open;
        }
        pending.armed = false;

        tracing::info!("Signalling connection opened");
        let _ = self.shared.event_tx.send(ChannelEvent::Opened);
        Ok(())
    }

    /// Sendet eine Nachricht (Best-Effort)
    ///
    /// Ohne offene Verbindung wird die Nachricht stillschweigend verworfen.
    pub fn send<T: Serialize>(&self, msg_type: &str, payload: T) {
        self.shared.send(msg_type, payload);
    }

    /// Schließt eine offene Verbindung
    ///
    /// Ein laufender Handshake kann nicht abgebrochen werden.
    pub fn close(&self) {
        let connection = {
            let mut state = self.shared.state.lock();
            match state.connection.as_ref() {
                None => return,
                Some(c) if !c.is_open() => {
                    tracing::warn!("Cannot close signalling connection during handshake");
                    return;
                }
                Some(_) => {}
            }
            state.state = ConnectionState::Closed;
            state.connection.take()
        };

        if let Some(connection) = connection {
            tracing::info!("Closing signalling connection");
            connection.shutdown();
            let _ = self.shared.event_tx.send(ChannelEvent::Closed {
                reason: CloseReason::Local,
            });
        }
    }
}

/// Gibt den CONNECTING-Slot frei, solange er nicht entschärft wurde
struct PendingOpen<'a> {
    shared: &'a Shared,
    generation: u64,
    armed: bool,
}

impl Drop for PendingOpen<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.abandon(self.generation);
        }
    }
}

impl Shared {
    fn send<T: Serialize>(&self, msg_type: &str, payload: T) {
        let Some(tx) = self
            .state
            .lock()
            .connection
            .as_ref()
            .and_then(|c| c.outbound.clone())
        else {
            return;
        };

        match OutboundMessage::new(msg_type, payload).to_frame() {
            Ok(frame) => {
                let _ = tx.send(frame);
            }
            Err(e) => tracing::warn!("Dropping unserializable {} message: {}", msg_type, e),
        }
    }

    /// Räumt den Slot nach einem gescheiterten Handshake
    fn abandon(&self, generation: u64) {
        let mut state = self.state.lock();
        if state
            .connection
            .as_ref()
            .is_some_and(|c| c.generation == generation)
        {
            state.connection = None;
            state.state = ConnectionState::Closed;
        }
    }

    /// Beendet die Verbindung `generation`, falls sie noch aktuell ist
    fn teardown(&self, generation: u64, reason: CloseReason) {
        let connection = {
            let mut state = self.state.lock();
            if !state
                .connection
                .as_ref()
                .is_some_and(|c| c.generation == generation)
            {
                return;
            }
            state.state = ConnectionState::Closed;
            state.connection.take()
        };

        if let Some(connection) = connection {
            match &reason {
                CloseReason::TransportError(e) => {
                    tracing::error!("Signalling connection failed: {}", e)
                }
                _ => tracing::info!("Signalling connection closed: {:?}", reason),
            }
            connection.shutdown();
            let _ = self.event_tx.send(ChannelEvent::Closed { reason });
        }
    }

    fn dispatch(&self, raw: &str) {
        // Handler klonen, damit er ohne Lock läuft
        let handler = self.handler.read().clone();
        let Some(handler) = handler else {
            tracing::debug!("No message handler registered, dropping frame");
            return;
        };

        // Ein panischer Handler verliert nur diesen Frame
        if catch_unwind(AssertUnwindSafe(|| handler(raw))).is_err() {
            tracing::error!("Signalling message handler panicked, frame dropped");
        }
    }

    async fn read_loop(shared: Arc<Self>, generation: u64, mut stream: FrameStream) {
        let mut reason = CloseReason::Server;

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    tracing::trace!("Received signalling message: {}", text);
                    shared.dispatch(&text);
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!("Signalling connection closed by server: {:?}", frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    tracing::trace!("Received binary signalling frame ({} bytes)", data.len());
                    shared.dispatch(&String::from_utf8_lossy(&data));
                }
                Ok(_) => {}
                Err(e) => {
                    reason = CloseReason::TransportError(e.to_string());
                    break;
                }
            }
        }

        shared.teardown(generation, reason);
    }

    async fn write_loop(
        shared: Arc<Self>,
        generation: u64,
        mut sink: FrameSink,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                tracing::error!("Failed to send signalling message: {}", e);
                shared.teardown(generation, CloseReason::TransportError(e.to_string()));
                return;
            }
        }

        // Sender wurde beim Teardown verworfen
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    }

    async fn heartbeat_loop(shared: Arc<Self>, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            tracing::trace!("Sending heartbeat");
            shared.send(HEARTBEAT, HeartbeatPayload::ping());
        }
    }
}

impl std::fmt::Debug for SignallingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignallingChannel")
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Konference - Signalling-Client
//!
//! Client-Seite des Signalling-Pfads einer P2P Voice/Video-Chat Applikation:
//! - Authentifizierter WebSocket-Kanal zum Signalling-Server
//! - Transport für SDP Offers/Answers und ICE Candidates
//! - Heartbeat gegen Idle-Timeouts von Proxies und Load Balancern
//!
//! ## Verwendung
//! ```no_run
//! # async fn run() -> Result<(), konference_lib::signalling::SignallingError> {
//! use konference_lib::config::SignallingConfig;
//! use konference_lib::signalling::SignallingChannel;
//!
//! let channel = SignallingChannel::instance(SignallingConfig::default());
//! channel.register_on_message_handler(|raw| println!("{}", raw));
//! channel.open("token").await?;
//! channel.send("OFFER", serde_json::json!({ "sdp": "v=0" }));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod signalling;

use tracing_subscriber::EnvFilter;

/// Standard-Filter, falls `RUST_LOG` nicht gesetzt ist
const DEFAULT_LOG_FILTER: &str = "konference=debug";

/// Initialisiert das Logging
///
/// Mehrfache Aufrufe sind unschädlich, nur der erste installiert den
/// Subscriber.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

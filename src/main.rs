//! Signalling-Probe
//!
//! Öffnet den Signalling-Kanal mit `AUTH_TOKEN` und loggt alle eingehenden
//! Nachrichten, bis Ctrl-C gedrückt wird oder der Server die Verbindung
//! schließt.

use anyhow::Context;
use konference_lib::config::SignallingConfig;
use konference_lib::signalling::{ChannelEvent, Envelope, SignallingChannel};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    konference_lib::init_logging();

    let config = SignallingConfig::from_env().context("Invalid signalling configuration")?;
    let token = std::env::var("AUTH_TOKEN").context("AUTH_TOKEN must be set")?;

    let channel = SignallingChannel::instance(config);
    channel.register_on_message_handler(|raw| match Envelope::decode(raw) {
        Ok(envelope) if envelope.is_heartbeat() => tracing::debug!("Heartbeat acknowledged"),
        Ok(envelope) => tracing::info!(
            "Received {} message: {}",
            envelope.msg_type,
            envelope.payload
        ),
        Err(e) => tracing::warn!("Undecodable signalling frame ({}): {}", e, raw),
    });

    let mut events = channel.subscribe();
    channel
        .open(&token)
        .await
        .context("Failed to open signalling channel")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                channel.close();
                break;
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::Closed { reason }) => {
                    tracing::warn!("Signalling channel closed: {:?}", reason);
                    break;
                }
                Ok(ChannelEvent::Opened) => {}
                Err(RecvError::Lagged(n)) => tracing::warn!("Missed {} channel events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

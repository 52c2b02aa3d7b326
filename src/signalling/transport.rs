//! Transport-Schicht für den Signalling-Kanal
//!
//! Ein `Connector` führt den Handshake durch und liefert Sink und Stream
//! für Frames. Produktiv wird `tokio-tungstenite` verwendet.

use futures::future::BoxFuture;
use futures::{FutureExt, Sink, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

/// Schreibende Hälfte einer Verbindung
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Lesende Hälfte einer Verbindung
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// Eine geöffnete Duplex-Verbindung
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Baut Verbindungen zum Signalling-Server auf
pub trait Connector: Send + Sync + 'static {
    /// Führt den Handshake gegen `target` durch
    fn connect(&self, target: Url) -> BoxFuture<'static, Result<Transport, WsError>>;
}

/// WebSocket Connector (ws:// und wss://)
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, target: Url) -> BoxFuture<'static, Result<Transport, WsError>> {
        async move {
            let (ws_stream, _) = connect_async(target.as_str()).await?;
            let (sink, stream) = ws_stream.split();

            Ok(Transport {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        }
        .boxed()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    #[tokio::test]
    async fn test_websocket_connector_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (uri_tx, uri_rx) = oneshot::channel::<String>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let _ = uri_tx.send(req.uri().to_string());
                Ok(resp)
            };
            let mut ws = accept_hdr_async(stream, callback).await.unwrap();

            // Echo eines Frames
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(format!("echo:{}", text))).await.unwrap();
            }
        });

        let target = Url::parse(&format!("ws://{}/ws?auth_token=abc", addr)).unwrap();
        let mut transport = WebSocketConnector.connect(target).await.unwrap();

        assert_eq!(uri_rx.await.unwrap(), "/ws?auth_token=abc");

        transport
            .sink
            .send(Message::Text("hello".to_string()))
            .await
            .unwrap();

        match transport.stream.next().await {
            Some(Ok(Message::Text(text))) => assert_eq!(text, "echo:hello"),
            other => panic!("unexpected frame: {:?}", other),
        }

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_websocket_connector_refused() {
        // Port freigeben, damit niemand darauf lauscht
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = Url::parse(&format!("ws://{}/ws", addr)).unwrap();
        assert!(WebSocketConnector.connect(target).await.is_err());
    }
}

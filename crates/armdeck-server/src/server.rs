//! [`DemoServer`] – HTTP + WebSocket server for the arm demo console.
//!
//! Listens on `0.0.0.0:8000` (configurable via [`DemoServer::with_port`]).
//!
//! * Regular HTTP requests → 200 OK with the embedded console HTML.
//! * WebSocket upgrades → JSON message loop against the [`Coordinator`].

use std::net::SocketAddr;
use std::sync::Arc;

use armdeck_engine::{ChatEngine, ChatMessage};
use armdeck_types::{ArmError, ClientMessage, Phase, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connection::{ConnectionManager, OutboundSender};
use crate::coordinator::Coordinator;

/// Default TCP port for the demo HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8000;

/// The compiled-in demo console (HTML + CSS + JS).
const CONSOLE_HTML: &str = include_str!("console.html");

// ---------------------------------------------------------------------------
// ServerContext
// ---------------------------------------------------------------------------

/// Shared state handed to every connection handler.
pub struct ServerContext {
    pub manager: Arc<ConnectionManager>,
    pub coordinator: Arc<Coordinator>,
    pub engine: Arc<dyn ChatEngine>,
}

// ---------------------------------------------------------------------------
// DemoServer
// ---------------------------------------------------------------------------

/// Lightweight HTTP + WebSocket server that serves the demo console and
/// drives the arm through the [`Coordinator`].
pub struct DemoServer {
    ctx: Arc<ServerContext>,
    port: u16,
}

impl DemoServer {
    /// Create a server on the [`DEFAULT_PORT`].
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            ctx,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start the server.
    ///
    /// Listens for TCP connections and dispatches each one as either a
    /// WebSocket session (when the HTTP request contains `Upgrade: websocket`)
    /// or a plain HTTP response serving the console HTML.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Config`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), ArmError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ArmError::Config(format!("bind error on {addr}: {e}")))?;

        info!(port = self.port, "demo console listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, ctx).await {
                            warn!(%peer, error = %e, "client connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServerContext>,
) -> Result<(), ArmError> {
    // Peek at the first bytes of the request to decide whether to upgrade
    // to WebSocket or serve the static HTML.  `peek` does not consume the
    // data, so tungstenite's handshaker sees the full HTTP request.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| ArmError::Config(format!("peek error from {peer}: {e}")))?;

    let header_preview = String::from_utf8_lossy(&buf[..n]);
    let is_ws_upgrade = header_preview.lines().any(|line| {
        line.to_lowercase().starts_with("upgrade:") && line.to_lowercase().contains("websocket")
    });

    if is_ws_upgrade {
        handle_ws(stream, peer, ctx).await
    } else {
        serve_html(stream).await
    }
}

// ---------------------------------------------------------------------------
// Plain HTTP: serve the embedded console HTML
// ---------------------------------------------------------------------------

async fn serve_html(mut stream: TcpStream) -> Result<(), ArmError> {
    let body = CONSOLE_HTML;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| ArmError::Config(format!("HTTP write error: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// WebSocket session
// ---------------------------------------------------------------------------

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServerContext>,
) -> Result<(), ArmError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ArmError::Config(format!("WS handshake from {peer}: {e}")))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    ctx.manager.register(id, tx.clone()).await;

    loop {
        tokio::select! {
            // ── Outbound: broadcasts and direct replies → browser ──────────
            out = rx.recv() => {
                let Some(message) = out else { break };
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "outbound serialization error");
                    }
                }
            }
            // ── Inbound: browser → command dispatch ────────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(text.as_str(), &ctx, &tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    ctx.manager.deregister(id).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Inbound message dispatch
// ---------------------------------------------------------------------------

/// Parse one incoming WebSocket text message and react to it.
///
/// Recognised messages:
///
/// | Message | Effect |
/// |---|---|
/// | `{"type":"chat","text":...}` | Chat engine reply, sent to this client only |
/// | `{"type":"command","action":"start_stream"}` | Starts the camera stream |
/// | `{"type":"command","action":"stop_stream"}` | Stops the camera stream |
/// | `{"type":"command","action":"search_and_grasp","object":...}` | Starts the scripted behavior |
///
/// Acknowledgements and error reports go to the requesting client only;
/// the stream frames and behavior events themselves are broadcast.
pub(crate) async fn handle_client_message(
    text: &str,
    ctx: &Arc<ServerContext>,
    reply_tx: &OutboundSender,
) {
    // Distinguish broken JSON from well-formed-but-unknown messages.
    let Ok(raw) = serde_json::from_str::<Value>(text) else {
        let _ = reply_tx.send(ServerMessage::error("Invalid JSON"));
        return;
    };

    let Ok(message) = serde_json::from_value::<ClientMessage>(raw.clone()) else {
        let kind = raw
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default();
        let _ = reply_tx.send(ServerMessage::error(format!(
            "Unknown message type: '{kind}'"
        )));
        return;
    };

    match message {
        ClientMessage::Chat { text } => {
            debug!(len = text.len(), "chat message received");
            match ctx.engine.reply(&[ChatMessage::user(text)]).await {
                Ok(reply) => {
                    let _ = reply_tx.send(ServerMessage::Chat { text: reply });
                }
                Err(e) => {
                    error!(error = %e, "chat engine failed");
                    let _ = reply_tx.send(ServerMessage::error(format!("Chat failed: {e}")));
                }
            }
        }
        ClientMessage::Command { action, object } => match action.as_str() {
            "start_stream" => {
                ctx.coordinator.start_streaming().await;
                let _ = reply_tx.send(ServerMessage::status(Phase::Streaming, "streaming_started"));
            }
            "stop_stream" => {
                ctx.coordinator.stop_streaming().await;
                let _ = reply_tx.send(ServerMessage::status(Phase::Idle, "streaming_stopped"));
            }
            "search_and_grasp" => {
                // Blank names collapse to the generic placeholder.
                let object = object
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .unwrap_or_else(|| "object".to_string());
                ctx.coordinator.start_behavior(object.clone()).await;
                let _ = reply_tx.send(ServerMessage::status(
                    Phase::Searching,
                    format!("search_and_grasp started for '{object}' (mock mode)"),
                ));
            }
            other => {
                let _ = reply_tx.send(ServerMessage::error(format!(
                    "Unknown command action: '{other}'"
                )));
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! `armdeck-server` – the demo WebSocket server
//!
//! Boots a lightweight HTTP + WebSocket server (default port `8000`) that:
//!
//! 1. **Serves** the static demo console (HTML/CSS/JS) at every
//!    non-WebSocket HTTP path.
//!
//! 2. **Broadcasts** arm events to every connected browser tab: `frame`
//!    thumbnails with joint readings while streaming, `status` phase changes,
//!    and `reasoning` lines from the scripted behavior.
//!
//! 3. **Accepts** JSON messages from the browser:
//!    - `{"type":"chat","text":...}` → chat engine reply to that client.
//!    - `{"type":"command","action":"start_stream" | "stop_stream" |
//!      "search_and_grasp"}` → drives the [`Coordinator`].
//!
//! The [`Coordinator`] enforces single-flight semantics for both background
//! task kinds: starting the stream twice is a no-op, and starting a second
//! behavior cancels the first.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use armdeck_engine::{LlmConfig, make_engine};
//! use armdeck_hal::MockArm;
//! use armdeck_server::{BehaviorScript, ConnectionManager, Coordinator, DemoServer, ServerContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = Arc::new(ConnectionManager::new());
//!     let coordinator = Coordinator::new(
//!         Arc::clone(&manager),
//!         Box::new(MockArm::new()),
//!         15,
//!         BehaviorScript::default(),
//!     );
//!     let ctx = Arc::new(ServerContext {
//!         manager,
//!         coordinator,
//!         engine: Arc::from(make_engine(&LlmConfig::default())),
//!     });
//!     DemoServer::new(ctx).run().await.expect("demo server failed");
//! }
//! ```

pub mod connection;
pub mod coordinator;
pub mod server;

pub use connection::{ConnectionId, ConnectionManager, OutboundSender};
pub use coordinator::{BehaviorScript, Coordinator};
pub use server::{DEFAULT_PORT, DemoServer, ServerContext};

//! [`ConnectionManager`] – the broadcast set of connected clients.
//!
//! Each WebSocket connection is represented by an unbounded channel sender;
//! the connection's writer task drains the receiving end into the socket.
//! The map is the only concurrently-mutated shared structure in the server
//! and every read-modify-write runs under one lock.

use std::collections::HashMap;

use armdeck_types::ServerMessage;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

/// Opaque handle for one client connection.
pub type ConnectionId = Uuid;

/// Outbound channel handed to [`ConnectionManager::register`]. Dropping the
/// receiving end marks the connection dead; the next broadcast evicts it.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// Tracks every connection currently eligible to receive broadcasts.
#[derive(Default)]
pub struct ConnectionManager {
    connections: Mutex<HashMap<ConnectionId, OutboundSender>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly accepted connection to the broadcast set.
    pub async fn register(&self, id: ConnectionId, tx: OutboundSender) {
        let mut conns = self.connections.lock().await;
        conns.insert(id, tx);
        info!(total = conns.len(), "client connected");
    }

    /// Remove a connection from the broadcast set. Idempotent.
    pub async fn deregister(&self, id: ConnectionId) {
        let mut conns = self.connections.lock().await;
        conns.remove(&id);
        info!(total = conns.len(), "client disconnected");
    }

    /// Deliver `message` to every registered connection, best-effort.
    ///
    /// A recipient whose channel is closed is dropped from the set after the
    /// delivery pass; the failure never surfaces to the caller and never
    /// blocks delivery to the other recipients.
    pub async fn broadcast(&self, message: ServerMessage) {
        let mut conns = self.connections.lock().await;
        let mut dead: Vec<ConnectionId> = Vec::new();
        for (id, tx) in conns.iter() {
            if tx.send(message.clone()).is_err() {
                warn!(connection = %id, "broadcast delivery failed; evicting");
                dead.push(*id);
            }
        }
        for id in dead {
            conns.remove(&id);
        }
    }

    /// Number of currently registered connections.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// `true` when no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armdeck_types::Phase;

    #[tokio::test]
    async fn register_deregister_net_effect() {
        let manager = ConnectionManager::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(manager.is_empty().await);
        manager.register(a, tx_a).await;
        manager.register(b, tx_b).await;
        assert_eq!(manager.len().await, 2);
        assert!(!manager.is_empty().await);

        manager.deregister(a).await;
        assert_eq!(manager.len().await, 1);

        // Deregister is idempotent.
        manager.deregister(a).await;
        assert_eq!(manager.len().await, 1);

        manager.deregister(b).await;
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let manager = ConnectionManager::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.register(Uuid::new_v4(), tx_a).await;
        manager.register(Uuid::new_v4(), tx_b).await;

        manager.broadcast(ServerMessage::phase(Phase::Idle)).await;

        assert!(matches!(
            rx_a.recv().await,
            Some(ServerMessage::Status { .. })
        ));
        assert!(matches!(
            rx_b.recv().await,
            Some(ServerMessage::Status { .. })
        ));
    }

    #[tokio::test]
    async fn failing_recipient_is_evicted_without_disturbing_others() {
        let manager = ConnectionManager::new();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        manager.register(Uuid::new_v4(), tx_live).await;
        manager.register(Uuid::new_v4(), tx_dead).await;

        // Simulate a dead peer: its writer task is gone.
        drop(rx_dead);

        manager.broadcast(ServerMessage::phase(Phase::Streaming)).await;

        assert!(rx_live.recv().await.is_some());
        assert_eq!(manager.len().await, 1);

        // The survivor keeps receiving on subsequent broadcasts.
        manager.broadcast(ServerMessage::phase(Phase::Idle)).await;
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn per_recipient_order_matches_broadcast_order() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.register(Uuid::new_v4(), tx).await;

        manager.broadcast(ServerMessage::reasoning("first")).await;
        manager.broadcast(ServerMessage::reasoning("second")).await;

        match rx.recv().await {
            Some(ServerMessage::Reasoning { thought }) => assert_eq!(thought, "first"),
            other => panic!("unexpected: {other:?}"),
        }
        match rx.recv().await {
            Some(ServerMessage::Reasoning { thought }) => assert_eq!(thought, "second"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn membership_is_stable_under_concurrent_broadcasts() {
        use std::sync::Arc;
        let manager = Arc::new(ConnectionManager::new());

        // Hold receivers so no connection is evicted as dead.
        let mut receivers = Vec::new();
        let broadcaster = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                for _ in 0..100 {
                    manager.broadcast(ServerMessage::phase(Phase::Idle)).await;
                }
            })
        };

        let mut ids = Vec::new();
        for _ in 0..20 {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = Uuid::new_v4();
            manager.register(id, tx).await;
            receivers.push(rx);
            ids.push(id);
        }
        for id in ids.iter().take(5) {
            manager.deregister(*id).await;
        }

        broadcaster.await.unwrap();
        // Net effect: 20 registered, 5 removed.
        assert_eq!(manager.len().await, 15);
    }
}

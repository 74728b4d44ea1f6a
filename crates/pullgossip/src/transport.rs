//! Transport abstraction for gossip nodes.
//!
//! The transport delivers [`PullMessage`]s between peers. Authentication,
//! encryption and wire encoding are its responsibility, not the engine's.

use async_trait::async_trait;

use pullgossip_core::PeerId;

use crate::error::Result;
use crate::messages::PullMessage;

/// Transport trait for sending and receiving pull messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a message to a specific peer.
    async fn send(&self, peer: &PeerId, message: PullMessage) -> Result<()>;

    /// Receive the next message from any peer.
    ///
    /// Returns the sender's id and the message. Blocks until a message is
    /// available or the inbox is closed.
    async fn recv(&self) -> Result<(PeerId, PullMessage)>;

    /// Get the local peer's identity.
    fn local_peer_id(&self) -> PeerId;

    /// List currently reachable peers, excluding ourselves.
    async fn connected_peers(&self) -> Result<Vec<PeerId>>;
}

/// A simple in-memory transport for testing.
///
/// Uses channels to simulate message passing between peers.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    use crate::error::NodeError;

    /// Inbox capacity per peer.
    const INBOX_CAPACITY: usize = 1024;

    /// Message envelope for internal routing.
    #[derive(Debug, Clone)]
    struct Envelope {
        from: PeerId,
        message: PullMessage,
    }

    /// Shared state for the memory transport network.
    #[derive(Default)]
    pub struct MemoryNetwork {
        /// Sender channels for each peer.
        senders: RwLock<HashMap<PeerId, mpsc::Sender<Envelope>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport connected to this network.
        pub async fn create_transport(self: &Arc<Self>, peer_id: PeerId) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

            self.senders.write().await.insert(peer_id.clone(), tx);

            MemoryTransport {
                peer_id,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Detach a peer. Messages to it fail from now on; its inbox drains
        /// and then closes.
        pub async fn disconnect(&self, peer_id: &PeerId) -> bool {
            self.senders.write().await.remove(peer_id).is_some()
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        peer_id: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<Envelope>>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, peer: &PeerId, message: PullMessage) -> Result<()> {
            let sender = {
                let senders = self.network.senders.read().await;
                senders
                    .get(peer)
                    .cloned()
                    .ok_or_else(|| NodeError::PeerNotFound(peer.clone()))?
            };
            let envelope = Envelope {
                from: self.peer_id.clone(),
                message,
            };
            sender
                .send(envelope)
                .await
                .map_err(|_| NodeError::ChannelClosed)
        }

        async fn recv(&self) -> Result<(PeerId, PullMessage)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(envelope) => Ok((envelope.from, envelope.message)),
                None => Err(NodeError::ChannelClosed),
            }
        }

        fn local_peer_id(&self) -> PeerId {
            self.peer_id.clone()
        }

        async fn connected_peers(&self) -> Result<Vec<PeerId>> {
            let senders = self.network.senders.read().await;
            let mut peers: Vec<PeerId> = senders
                .keys()
                .filter(|id| *id != &self.peer_id)
                .cloned()
                .collect();
            peers.sort();
            Ok(peers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNetwork;
    use super::*;
    use crate::error::NodeError;
    use pullgossip_core::Nonce;

    #[tokio::test]
    async fn test_memory_transport_send_recv() {
        let network = MemoryNetwork::new();

        let transport_a = network.create_transport("a".into()).await;
        let transport_b = network.create_transport("b".into()).await;

        let msg = PullMessage::Hello { nonce: Nonce(7) };
        transport_a.send(&"b".into(), msg.clone()).await.unwrap();

        let (from, received) = transport_b.recv().await.unwrap();
        assert_eq!(from, PeerId::from("a"));
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn test_connected_peers_excludes_self() {
        let network = MemoryNetwork::new();
        let transport_a = network.create_transport("a".into()).await;
        let _b = network.create_transport("b".into()).await;
        let _c = network.create_transport("c".into()).await;

        let peers = transport_a.connected_peers().await.unwrap();
        assert_eq!(peers, vec![PeerId::from("b"), PeerId::from("c")]);
    }

    #[tokio::test]
    async fn test_send_to_disconnected_peer_fails() {
        let network = MemoryNetwork::new();
        let transport_a = network.create_transport("a".into()).await;
        let _b = network.create_transport("b".into()).await;

        assert!(network.disconnect(&"b".into()).await);
        let err = transport_a
            .send(&"b".into(), PullMessage::Hello { nonce: Nonce(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::PeerNotFound(peer) if peer == PeerId::from("b")));
    }
}

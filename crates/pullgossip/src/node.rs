//! Gossip node: a pull engine bound to a transport.
//!
//! The node owns the message-dispatch layer. Every message the transport
//! delivers is routed to the matching engine handler, and every send the
//! engine makes goes back out through the same transport.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use pullgossip_core::{AcceptAll, DigestFilter, ItemId, Nonce, PeerId, PullError};
use pullgossip_engine::{PullAdapter, PullConfig, PullEngine};

use crate::messages::PullMessage;
use crate::transport::Transport;

/// Configuration for a gossip node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Engine timing.
    pub pull: PullConfig,
    /// How many peers to pull from per round.
    pub peer_num: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            pull: PullConfig::default(),
            peer_num: 3,
        }
    }
}

impl NodeConfig {
    /// Parse from TOML; engine timing lives under a `[pull]` table.
    pub fn from_toml_str(s: &str) -> pullgossip_core::Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| PullError::InvalidConfig(e.to_string()))?;
        config.pull.validate()?;
        if config.peer_num == 0 {
            return Err(PullError::InvalidConfig("peer_num must be positive".into()));
        }
        Ok(config)
    }
}

/// Who sent an inbound Hello or Request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InboundContext {
    pub from: PeerId,
}

impl From<PeerId> for InboundContext {
    fn from(from: PeerId) -> Self {
        Self { from }
    }
}

/// [`PullAdapter`] over a [`Transport`].
pub struct NodeAdapter<T: Transport> {
    transport: Arc<T>,
    peer_num: usize,
    rng: Mutex<StdRng>,
}

impl<T: Transport> NodeAdapter<T> {
    pub fn new(transport: Arc<T>, peer_num: usize) -> Self {
        Self {
            transport,
            peer_num,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    async fn send(&self, dest: &PeerId, message: PullMessage) -> pullgossip_core::Result<()> {
        self.transport
            .send(dest, message)
            .await
            .map_err(|e| PullError::Transport(e.to_string()))
    }
}

#[async_trait]
impl<T: Transport> PullAdapter for NodeAdapter<T> {
    type Context = InboundContext;

    /// Up to `peer_num` reachable peers, chosen uniformly at random.
    async fn select_peers(&self) -> Vec<PeerId> {
        let peers = match self.transport.connected_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                debug!(error = %e, "peer listing failed");
                return Vec::new();
            }
        };
        let mut rng = self.rng.lock();
        peers
            .choose_multiple(&mut *rng, self.peer_num)
            .cloned()
            .collect()
    }

    async fn hello(&self, dest: &PeerId, nonce: Nonce) -> pullgossip_core::Result<()> {
        self.send(dest, PullMessage::Hello { nonce }).await
    }

    async fn send_digest(
        &self,
        digest: Vec<ItemId>,
        nonce: Nonce,
        context: &InboundContext,
    ) -> pullgossip_core::Result<()> {
        let message = PullMessage::Digest {
            nonce,
            items: digest,
        };
        self.send(&context.from, message).await
    }

    async fn send_req(
        &self,
        dest: &PeerId,
        items: Vec<ItemId>,
        nonce: Nonce,
    ) -> pullgossip_core::Result<()> {
        self.send(dest, PullMessage::Request { nonce, items }).await
    }

    async fn send_res(
        &self,
        items: Vec<ItemId>,
        context: &InboundContext,
        nonce: Nonce,
    ) -> pullgossip_core::Result<()> {
        self.send(&context.from, PullMessage::Response { nonce, items })
            .await
    }
}

/// Route one inbound message to the matching engine handler.
///
/// Never waits on the network: replies are sent from their own tasks.
pub fn dispatch<A>(engine: &PullEngine<A>, from: PeerId, message: PullMessage)
where
    A: PullAdapter,
    A::Context: From<PeerId>,
{
    trace!(%from, kind = message.kind(), nonce = %message.nonce(), "inbound message");
    let context = A::Context::from(from);
    match message {
        PullMessage::Hello { nonce } => engine.on_hello(nonce, context),
        PullMessage::Digest { nonce, items } => engine.on_digest(items, nonce, &context),
        PullMessage::Request { nonce, items } => engine.on_req(items, nonce, context),
        PullMessage::Response { nonce, items } => engine.on_res(items, nonce),
    }
}

/// A peer taking part in pull gossip over transport `T`.
pub struct GossipNode<T: Transport> {
    engine: Arc<PullEngine<NodeAdapter<T>>>,
    transport: Arc<T>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> GossipNode<T> {
    /// Create a node that reveals all of its items to every peer.
    pub fn new(transport: T, config: NodeConfig) -> Self {
        Self::with_filter(transport, config, AcceptAll)
    }

    /// Create a node with a digest filter.
    pub fn with_filter<F>(transport: T, config: NodeConfig, filter: F) -> Self
    where
        F: DigestFilter<InboundContext> + 'static,
    {
        Self::with_engine(transport, config, |engine| engine.with_filter(filter))
    }

    /// Create a node, letting `customize` adjust the engine before it is shared.
    pub fn with_engine<F>(transport: T, config: NodeConfig, customize: F) -> Self
    where
        F: FnOnce(PullEngine<NodeAdapter<T>>) -> PullEngine<NodeAdapter<T>>,
    {
        let transport = Arc::new(transport);
        let adapter = NodeAdapter::new(Arc::clone(&transport), config.peer_num);
        let engine = customize(PullEngine::new(adapter, config.pull));
        Self {
            engine: Arc::new(engine),
            transport,
            listener: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<PullEngine<NodeAdapter<T>>> {
        &self.engine
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.transport.local_peer_id()
    }

    /// Start periodic rounds and message handling.
    pub fn start(&self) {
        self.engine.start();
        self.listen();
    }

    /// Start handling inbound messages without initiating rounds.
    ///
    /// Calling it again while the listener runs is a no-op.
    pub fn listen(&self) {
        let mut listener = self.listener.lock();
        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let transport = Arc::clone(&self.transport);
        *listener = Some(tokio::spawn(async move {
            loop {
                match transport.recv().await {
                    Ok((from, message)) => dispatch(&engine, from, message),
                    Err(e) => {
                        debug!(peer = %transport.local_peer_id(), error = %e, "inbox closed");
                        break;
                    }
                }
            }
        }));
    }

    /// Stop initiating rounds and stop handling messages.
    pub fn shutdown(&self) {
        self.engine.stop();
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }

    pub fn add<I: IntoIterator<Item = ItemId>>(&self, items: I) {
        self.engine.add(items);
    }

    pub fn remove<'a, I: IntoIterator<Item = &'a ItemId>>(&self, items: I) {
        self.engine.remove(items);
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        self.engine.contains(item)
    }

    /// Items held, sorted.
    pub fn items(&self) -> Vec<ItemId> {
        self.engine.items()
    }
}

impl<T: Transport> Drop for GossipNode<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! # Pull Gossip
//!
//! Anti-entropy, pull-based dissemination of named items between peers.
//! Peers periodically exchange digests of the items they hold and fetch only
//! what they are missing.
//!
//! ## Overview
//!
//! - [`engine`] runs the Hello → Digest → Request → Response rounds
//! - [`core`] holds the item set, nonce registries and digest filters
//! - [`GossipNode`] wires an engine to a [`Transport`], routing every decoded
//!   [`PullMessage`] to the matching engine handler
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pullgossip::{GossipNode, MemoryNetwork, NodeConfig};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let a = GossipNode::new(network.create_transport("a".into()).await, NodeConfig::default());
//!     let b = GossipNode::new(network.create_transport("b".into()).await, NodeConfig::default());
//!
//!     a.add(["block-1".into()]);
//!     a.start();
//!     b.start();
//!     // After a round or two, b holds "block-1" as well.
//! }
//! ```
//!
//! ## Key Properties
//!
//! - **Best effort per round**: lost messages are recovered by later rounds
//! - **Nonce-bound**: replies are only accepted under a live nonce and window
//! - **Load-balanced**: each missing item is requested from one random owner

pub mod error;
pub mod messages;
pub mod node;
pub mod transport;

pub use pullgossip_core as core;
pub use pullgossip_engine as engine;

pub use error::{NodeError, Result};
pub use messages::PullMessage;
pub use node::{dispatch, GossipNode, InboundContext, NodeAdapter, NodeConfig};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};

pub use pullgossip_core::{AcceptAll, DigestFilter, ItemId, Nonce, PeerId, PullError};
pub use pullgossip_engine::{PullConfig, PullEngine, RoundPhase};

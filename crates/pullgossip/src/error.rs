//! Error types for the node and transport layer.

use pullgossip_core::{PeerId, PullError};
use thiserror::Error;

/// Errors that can occur while running a gossip node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Engine-level error.
    #[error("pull error: {0}")]
    Pull(#[from] PullError),

    /// Destination is not attached to the network.
    #[error("peer not found: {0}")]
    PeerNotFound(PeerId),

    /// The local inbox or the peer's inbox was closed.
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

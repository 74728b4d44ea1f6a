//! Protocol messages.
//!
//! The four messages of a pull round. Encoding them for the wire is the
//! transport's business; they only derive serde so any codec can be used.

use serde::{Deserialize, Serialize};

use pullgossip_core::{ItemId, Nonce};

/// Pull protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullMessage {
    /// Initiator opens a round with this peer.
    Hello { nonce: Nonce },

    /// Responder advertises the items it is willing to reveal.
    Digest { nonce: Nonce, items: Vec<ItemId> },

    /// Initiator asks for specific items.
    Request { nonce: Nonce, items: Vec<ItemId> },

    /// Responder delivers the requested items it still holds.
    Response { nonce: Nonce, items: Vec<ItemId> },
}

impl PullMessage {
    /// The nonce this message is bound to.
    pub fn nonce(&self) -> Nonce {
        match self {
            PullMessage::Hello { nonce }
            | PullMessage::Digest { nonce, .. }
            | PullMessage::Request { nonce, .. }
            | PullMessage::Response { nonce, .. } => *nonce,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PullMessage::Hello { .. } => "hello",
            PullMessage::Digest { .. } => "digest",
            PullMessage::Request { .. } => "request",
            PullMessage::Response { .. } => "response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_and_kind() {
        let msg = PullMessage::Request {
            nonce: Nonce(12),
            items: vec!["a".into()],
        };
        assert_eq!(msg.nonce(), Nonce(12));
        assert_eq!(msg.kind(), "request");
        assert_eq!(PullMessage::Hello { nonce: Nonce(1) }.kind(), "hello");
    }
}

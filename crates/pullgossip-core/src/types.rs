//! Strong type definitions for pull gossip.
//!
//! Items and peers are opaque strings to the engine; they are wrapped in
//! newtypes so that an item can never be passed where a peer is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a gossiped item (block digest, membership fingerprint, ...).
///
/// The engine never inspects the contents; equality is all that matters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create a new item identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a remote peer as understood by the transport.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Create a new peer identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single-use correlation token binding a Hello to its Digest, Request
/// and Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(pub u64);

impl Nonce {
    /// Get the raw value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_display_is_fixed_width_hex() {
        assert_eq!(Nonce(0xab).to_string(), "00000000000000ab");
        assert_eq!(Nonce(u64::MAX).to_string(), "ffffffffffffffff");
    }

    #[test]
    fn test_item_and_peer_conversions() {
        let item: ItemId = "block-7".into();
        assert_eq!(item.as_str(), "block-7");
        assert_eq!(item, ItemId::new(String::from("block-7")));

        let peer = PeerId::from(String::from("peer-a"));
        assert_eq!(peer.to_string(), "peer-a");
    }
}

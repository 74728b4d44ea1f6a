//! # Pull Gossip Core
//!
//! Leaf primitives shared by the pull engine and its transports.
//!
//! ## Key Types
//!
//! - [`ItemId`] / [`PeerId`] / [`Nonce`] - strongly typed identifiers
//! - [`ItemSet`] - the thread-safe set of items a peer holds
//! - [`OutgoingNonces`] / [`IncomingNonces`] - correlation token registries
//! - [`DigestFilter`] - per-requester policy over which items may be revealed
//!
//! Nothing in this crate knows about rounds or timers; that lives in
//! `pullgossip-engine`.

pub mod error;
pub mod filter;
pub mod item_set;
pub mod nonce;
pub mod types;

pub use error::{PullError, Result};
pub use filter::{AcceptAll, DigestFilter, ItemPredicate};
pub use item_set::ItemSet;
pub use nonce::{IncomingNonces, OutgoingNonces, MAX_NONCE_ATTEMPTS};
pub use types::{ItemId, Nonce, PeerId};

//! # Pull Gossip Engine
//!
//! The pull protocol engine: periodic initiator rounds plus the reactive
//! responder handlers, coordinated through one lock-protected round state.
//!
//! ## Message Flow
//!
//! ```text
//! Responder                                 Initiator
//!   |<------- Hello <nonce> -------------------|
//!   |-------- Digest <[a, b, c], nonce> ------>|
//!   |<------- Request <[a, c], nonce> ---------|
//!   |-------- Response <[a, c], nonce> ------->|
//! ```
//!
//! The initiator opens a digest window when it sends its Hellos. When the
//! window closes it asks exactly one advertising owner for each missing item,
//! opens a response window, and closes the round after a fixed timeout.
//! Anything arriving outside a window, or under a nonce the engine does not
//! recognize, is dropped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pullgossip_engine::{PullConfig, PullEngine, RecordingAdapter};
//!
//! async fn example() {
//!     let adapter = RecordingAdapter::new(vec!["peer-a".into(), "peer-b".into()]);
//!     let engine = Arc::new(PullEngine::new(adapter, PullConfig::default()));
//!     engine.add(["block-1".into()]);
//!     engine.start();
//!     // ... feed inbound messages into engine.on_hello / on_digest / on_req / on_res
//!     engine.stop();
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod state;

pub use adapter::recording::{RecordingAdapter, Sent};
pub use adapter::PullAdapter;
pub use config::PullConfig;
pub use engine::PullEngine;
pub use state::{RequestPlan, RoundPhase};

pub use pullgossip_core::{
    AcceptAll, DigestFilter, ItemId, ItemSet, Nonce, PeerId, PullError, Result,
};

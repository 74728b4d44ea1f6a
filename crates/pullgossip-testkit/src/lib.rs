//! # Pull Gossip Testkit
//!
//! Testing utilities for the pull engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an engine wired to a [`RecordingAdapter`] with a seeded
//!   random source, plus helpers to walk it through a round
//! - **Generators**: proptest strategies for items, peers, nonces and
//!   digest advertisements
//!
//! ## Test Fixtures
//!
//! ```rust
//! use pullgossip_testkit::{item_ids, paused_runtime, EngineFixture};
//!
//! paused_runtime().block_on(async {
//!     let fixture = EngineFixture::new(&["p1"]);
//!     let nonces = fixture.start_round().await;
//!     fixture.engine.on_digest(item_ids(&["a"]), nonces[0].1, &"p1".into());
//!     fixture.close_digest_window().await;
//!     assert_eq!(fixture.adapter().requests().len(), 1);
//! });
//! ```
//!
//! [`RecordingAdapter`]: pullgossip_engine::RecordingAdapter

pub mod fixtures;
pub mod generators;

pub use fixtures::{item_ids, paused_runtime, peer_ids, settle, EngineFixture};
pub use generators::{advertisements, item_id, nonce, peer_id, set_ops, SetOp};

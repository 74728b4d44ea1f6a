//! Transport adapter abstraction for the pull engine.
//!
//! The engine never touches the network itself. Everything it sends goes
//! through a [`PullAdapter`], and everything it receives is fed back in by the
//! caller through the engine's `on_*` handlers.

use std::fmt;

use async_trait::async_trait;

use pullgossip_core::{ItemId, Nonce, PeerId, Result};

/// Capabilities the engine needs from its surroundings.
///
/// `Context` describes the sender of an inbound Hello or Request (identity,
/// envelope metadata, ...). The engine passes it back untouched when replying
/// and hands it to the digest filter.
///
/// Send failures are reported as errors but never retried by the engine;
/// the next round covers whatever was lost.
#[async_trait]
pub trait PullAdapter: Send + Sync + 'static {
    /// Per-message requester context.
    type Context: fmt::Debug + Send + Sync + 'static;

    /// Peers to initiate the next round with.
    async fn select_peers(&self) -> Vec<PeerId>;

    /// Send a Hello carrying `nonce` to `dest`.
    async fn hello(&self, dest: &PeerId, nonce: Nonce) -> Result<()>;

    /// Send a digest back to whoever sent the Hello described by `context`.
    async fn send_digest(
        &self,
        digest: Vec<ItemId>,
        nonce: Nonce,
        context: &Self::Context,
    ) -> Result<()>;

    /// Request specific items from `dest`.
    async fn send_req(&self, dest: &PeerId, items: Vec<ItemId>, nonce: Nonce) -> Result<()>;

    /// Send items back to whoever sent the Request described by `context`.
    async fn send_res(
        &self,
        items: Vec<ItemId>,
        context: &Self::Context,
        nonce: Nonce,
    ) -> Result<()>;
}

/// An adapter that records every send, for tests.
pub mod recording {
    use super::*;
    use parking_lot::Mutex;
    use pullgossip_core::PullError;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A message the engine asked the adapter to send.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Hello {
            to: PeerId,
            nonce: Nonce,
        },
        Digest {
            to: PeerId,
            nonce: Nonce,
            items: Vec<ItemId>,
        },
        Request {
            to: PeerId,
            nonce: Nonce,
            items: Vec<ItemId>,
        },
        Response {
            to: PeerId,
            nonce: Nonce,
            items: Vec<ItemId>,
        },
    }

    /// In-memory adapter. The requester context is simply the requester's
    /// [`PeerId`].
    #[derive(Debug, Default)]
    pub struct RecordingAdapter {
        peers: Mutex<Vec<PeerId>>,
        sent: Mutex<Vec<Sent>>,
        failing: AtomicBool,
        stalled: AtomicBool,
    }

    impl RecordingAdapter {
        /// Create an adapter whose peer selection always returns `peers`.
        pub fn new(peers: Vec<PeerId>) -> Self {
            Self {
                peers: Mutex::new(peers),
                ..Self::default()
            }
        }

        /// Replace the peer selection.
        pub fn set_peers(&self, peers: Vec<PeerId>) {
            *self.peers.lock() = peers;
        }

        /// Make every send fail (after recording it).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Make every send hang forever (after recording it), like a peer
        /// whose inbox never drains.
        pub fn set_stalled(&self, stalled: bool) {
            self.stalled.store(stalled, Ordering::SeqCst);
        }

        /// Everything sent so far.
        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
        }

        /// Drain the record.
        pub fn take_sent(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.sent.lock())
        }

        /// Hellos sent so far, as `(destination, nonce)`.
        pub fn hellos(&self) -> Vec<(PeerId, Nonce)> {
            self.sent
                .lock()
                .iter()
                .filter_map(|sent| match sent {
                    Sent::Hello { to, nonce } => Some((to.clone(), *nonce)),
                    _ => None,
                })
                .collect()
        }

        /// Nonce of the Hello sent to `peer`, if any.
        pub fn hello_nonce(&self, peer: &PeerId) -> Option<Nonce> {
            self.hellos()
                .into_iter()
                .rev()
                .find(|(to, _)| to == peer)
                .map(|(_, nonce)| nonce)
        }

        /// Requests sent so far, as `(destination, nonce, items)`.
        pub fn requests(&self) -> Vec<(PeerId, Nonce, Vec<ItemId>)> {
            self.sent
                .lock()
                .iter()
                .filter_map(|sent| match sent {
                    Sent::Request { to, nonce, items } => {
                        Some((to.clone(), *nonce, items.clone()))
                    }
                    _ => None,
                })
                .collect()
        }

        /// Digests sent so far, as `(destination, nonce, items)`.
        pub fn digests(&self) -> Vec<(PeerId, Nonce, Vec<ItemId>)> {
            self.sent
                .lock()
                .iter()
                .filter_map(|sent| match sent {
                    Sent::Digest { to, nonce, items } => Some((to.clone(), *nonce, items.clone())),
                    _ => None,
                })
                .collect()
        }

        /// Responses sent so far, as `(destination, nonce, items)`.
        pub fn responses(&self) -> Vec<(PeerId, Nonce, Vec<ItemId>)> {
            self.sent
                .lock()
                .iter()
                .filter_map(|sent| match sent {
                    Sent::Response { to, nonce, items } => {
                        Some((to.clone(), *nonce, items.clone()))
                    }
                    _ => None,
                })
                .collect()
        }

        async fn record(&self, sent: Sent) -> Result<()> {
            self.sent.lock().push(sent);
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(PullError::Transport("recording adapter set to fail".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PullAdapter for RecordingAdapter {
        type Context = PeerId;

        async fn select_peers(&self) -> Vec<PeerId> {
            self.peers.lock().clone()
        }

        async fn hello(&self, dest: &PeerId, nonce: Nonce) -> Result<()> {
            self.record(Sent::Hello {
                to: dest.clone(),
                nonce,
            })
            .await
        }

        async fn send_digest(
            &self,
            digest: Vec<ItemId>,
            nonce: Nonce,
            context: &PeerId,
        ) -> Result<()> {
            self.record(Sent::Digest {
                to: context.clone(),
                nonce,
                items: digest,
            })
            .await
        }

        async fn send_req(&self, dest: &PeerId, items: Vec<ItemId>, nonce: Nonce) -> Result<()> {
            self.record(Sent::Request {
                to: dest.clone(),
                nonce,
                items,
            })
            .await
        }

        async fn send_res(&self, items: Vec<ItemId>, context: &PeerId, nonce: Nonce) -> Result<()> {
            self.record(Sent::Response {
                to: context.clone(),
                nonce,
                items,
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::{RecordingAdapter, Sent};
    use super::*;
    use pullgossip_core::PullError;

    #[tokio::test]
    async fn test_recording_adapter_records_in_order() {
        let adapter = RecordingAdapter::new(vec!["p1".into()]);
        let p1 = PeerId::from("p1");

        adapter.hello(&p1, Nonce(1)).await.unwrap();
        adapter
            .send_req(&p1, vec!["a".into()], Nonce(1))
            .await
            .unwrap();

        assert_eq!(adapter.select_peers().await, vec![p1.clone()]);
        assert_eq!(adapter.hello_nonce(&p1), Some(Nonce(1)));
        assert_eq!(
            adapter.sent(),
            vec![
                Sent::Hello {
                    to: p1.clone(),
                    nonce: Nonce(1)
                },
                Sent::Request {
                    to: p1,
                    nonce: Nonce(1),
                    items: vec!["a".into()]
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_recording_adapter_failure_mode() {
        let adapter = RecordingAdapter::new(vec![]);
        adapter.set_failing(true);

        let err = adapter.hello(&"p1".into(), Nonce(3)).await.unwrap_err();
        assert!(matches!(err, PullError::Transport(_)));
        assert_eq!(adapter.take_sent().len(), 1);
        assert!(adapter.sent().is_empty());
    }
}

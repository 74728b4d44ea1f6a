//! Test fixtures and helpers.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use pullgossip_core::{ItemId, Nonce, PeerId};
use pullgossip_engine::{PullConfig, PullEngine, RecordingAdapter};

/// Build item ids from string literals.
pub fn item_ids(items: &[&str]) -> Vec<ItemId> {
    items.iter().map(|s| ItemId::from(*s)).collect()
}

/// Build peer ids from string literals.
pub fn peer_ids(peers: &[&str]) -> Vec<PeerId> {
    peers.iter().map(|s| PeerId::from(*s)).collect()
}

/// A single-threaded runtime with a paused clock, for driving the engine
/// from synchronous tests such as proptest bodies.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build test runtime")
}

/// Let spawned tasks (such as response sends) run to completion.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// An engine over a [`RecordingAdapter`] with a deterministic random source.
pub struct EngineFixture {
    pub engine: Arc<PullEngine<RecordingAdapter>>,
}

impl EngineFixture {
    /// Engine with default timing that selects `peers` every round.
    pub fn new(peers: &[&str]) -> Self {
        Self::with_seed(peers, 0)
    }

    pub fn with_seed(peers: &[&str], seed: u64) -> Self {
        Self::with_config(peers, PullConfig::default(), seed)
    }

    pub fn with_config(peers: &[&str], config: PullConfig, seed: u64) -> Self {
        Self::from_peers(peer_ids(peers), config, seed)
    }

    pub fn from_peers(peers: Vec<PeerId>, config: PullConfig, seed: u64) -> Self {
        let engine = PullEngine::new(RecordingAdapter::new(peers), config)
            .with_rng(StdRng::seed_from_u64(seed));
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn adapter(&self) -> &RecordingAdapter {
        self.engine.adapter()
    }

    /// Initiate a round and return the Hellos it sent.
    pub async fn start_round(&self) -> Vec<(PeerId, Nonce)> {
        let before = self.adapter().hellos().len();
        self.engine
            .initiate_pull()
            .await
            .expect("nonce generation failed");
        self.adapter().hellos().split_off(before)
    }

    /// Advance past the digest window so requests go out.
    pub async fn close_digest_window(&self) {
        let wait = self.engine.config().digest_wait;
        tokio::time::sleep(wait + Duration::from_millis(1)).await;
    }

    /// Advance past the response window so the round ends.
    pub async fn finish_round(&self) {
        let wait = self.engine.config().response_wait;
        tokio::time::sleep(wait + Duration::from_millis(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pullgossip_engine::RoundPhase;

    #[test]
    fn test_fixture_walks_a_round() {
        paused_runtime().block_on(async {
            let fixture = EngineFixture::new(&["p1", "p2"]);
            let hellos = fixture.start_round().await;
            assert_eq!(hellos.len(), 2);

            fixture.close_digest_window().await;
            assert_eq!(fixture.engine.phase(), RoundPhase::RequestsSent);

            fixture.finish_round().await;
            assert_eq!(fixture.engine.phase(), RoundPhase::Idle);
        });
    }

    #[test]
    fn test_same_seed_same_nonces() {
        let rt = paused_runtime();
        let first = rt.block_on(EngineFixture::with_seed(&["p1"], 9).start_round());
        let second = rt.block_on(EngineFixture::with_seed(&["p1"], 9).start_round());
        assert_eq!(first, second);
    }
}

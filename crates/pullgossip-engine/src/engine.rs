//! The pull engine.
//!
//! Runs the initiator side of the protocol on a periodic trigger and reacts
//! to inbound Hello, Digest, Request and Response messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use pullgossip_core::{AcceptAll, DigestFilter, IncomingNonces, ItemId, ItemSet, Nonce, Result};

use crate::adapter::PullAdapter;
use crate::config::PullConfig;
use crate::state::{RoundPhase, RoundState};

/// Pull-based gossip engine over an adapter `A`.
///
/// The engine must live in an [`Arc`]: phase timers and the periodic trigger
/// hold (weak) references back to it.
///
/// Shared state:
/// - the item set, with its own lock;
/// - the round state, behind one mutex covering round start, digest
///   accumulation, request planning, response acceptance and teardown;
/// - the incoming nonce registry, with its own lock;
/// - two atomic window flags, checked before any lock is taken.
pub struct PullEngine<A: PullAdapter> {
    adapter: Arc<A>,
    config: PullConfig,
    filter: Arc<dyn DigestFilter<A::Context>>,
    items: ItemSet,
    incoming: Arc<IncomingNonces>,
    round: Mutex<RoundState>,
    accepting_digests: AtomicBool,
    accepting_responses: AtomicBool,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl<A: PullAdapter> PullEngine<A> {
    /// Create an engine that reveals every item to every requester.
    pub fn new(adapter: A, config: PullConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            adapter: Arc::new(adapter),
            config,
            filter: Arc::new(AcceptAll),
            items: ItemSet::new(),
            incoming: Arc::new(IncomingNonces::new()),
            round: Mutex::new(RoundState::new(StdRng::from_entropy())),
            accepting_digests: AtomicBool::new(false),
            accepting_responses: AtomicBool::new(false),
            started: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Use `filter` to decide which items each requester may see.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: DigestFilter<A::Context> + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Replace the random source used for nonces and owner selection.
    pub fn with_rng<R: RngCore + Send + 'static>(self, rng: R) -> Self {
        self.round.lock().set_rng(rng);
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &PullConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Spawn the periodic round trigger. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let engine = Arc::downgrade(self);
        let interval = self.config.pull_interval;
        let mut shutdown = self.shutdown.subscribe();
        info!(interval_ms = interval.as_millis() as u64, "pull engine started");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => break,
                }
                let Some(engine) = engine.upgrade() else { break };
                if engine.is_stopped() {
                    break;
                }
                if let Err(e) = engine.initiate_pull().await {
                    warn!(error = %e, "failed to initiate pull round");
                }
            }
            debug!("pull trigger exited");
        });
    }

    /// Stop the periodic trigger. Rounds already in flight run out on their
    /// own timers.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            info!("pull engine stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Item set
    // ─────────────────────────────────────────────────────────────────────────

    /// Add items to the local set.
    pub fn add<I: IntoIterator<Item = ItemId>>(&self, items: I) {
        self.items.add_all(items);
    }

    /// Remove items from the local set.
    pub fn remove<'a, I: IntoIterator<Item = &'a ItemId>>(&self, items: I) {
        self.items.remove_all(items);
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        self.items.contains(item)
    }

    /// Snapshot of the local set, sorted.
    pub fn items(&self) -> Vec<ItemId> {
        let mut items = self.items.snapshot();
        items.sort();
        items
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Initiator
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a round: schedule the digest phase, then send a Hello with a
    /// fresh nonce to every selected peer.
    ///
    /// Returns once every Hello is out, or when the digest window closes with
    /// some still pending. Does nothing if the previous round has not
    /// finished yet.
    pub async fn initiate_pull(self: &Arc<Self>) -> Result<()> {
        let peers = self.adapter.select_peers().await;

        let (generation, hellos) = {
            let mut round = self.round.lock();
            if round.phase != RoundPhase::Idle {
                debug!(generation = round.generation, "previous round still running, skipping");
                return Ok(());
            }

            let generation = round.begin();
            let mut hellos = Vec::with_capacity(peers.len());
            for peer in peers {
                match round.register_peer(peer.clone()) {
                    Ok(Some(nonce)) => hellos.push((peer, nonce)),
                    Ok(None) => {}
                    Err(e) => {
                        round.reset();
                        return Err(e);
                    }
                }
            }
            self.accepting_digests.store(true, Ordering::SeqCst);
            (generation, hellos)
        };

        debug!(generation, peers = hellos.len(), "round started");
        let engine = Arc::downgrade(self);
        let wait = self.config.digest_wait;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(engine) = engine.upgrade() {
                engine.process_incoming_digests(generation).await;
            }
        });

        let mut sends = JoinSet::new();
        for (peer, nonce) in hellos {
            let adapter = Arc::clone(&self.adapter);
            sends.spawn(async move {
                if let Err(e) = adapter.hello(&peer, nonce).await {
                    debug!(%peer, %nonce, error = %e, "hello not sent");
                }
            });
        }
        finish_sends(sends, wait, generation, "hello").await;
        Ok(())
    }

    /// Close the digest window, request each missing item from one random
    /// owner, and schedule the end of the round.
    async fn process_incoming_digests(self: Arc<Self>, generation: u64) {
        let plans = {
            let mut round = self.round.lock();
            if round.generation != generation || round.phase != RoundPhase::HelloSent {
                trace!(generation, "stale digest timer");
                return;
            }
            self.accepting_digests.store(false, Ordering::SeqCst);
            let plans = round.plan_requests(&self.items);
            round.phase = RoundPhase::RequestsSent;
            self.accepting_responses.store(true, Ordering::SeqCst);
            plans
        };

        debug!(generation, requests = plans.len(), "digest window closed");
        let engine = Arc::downgrade(&self);
        let wait = self.config.response_wait;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(engine) = engine.upgrade() {
                engine.end_pull(generation);
            }
        });

        let mut sends = JoinSet::new();
        for plan in plans {
            let adapter = Arc::clone(&self.adapter);
            sends.spawn(async move {
                let count = plan.items.len();
                if let Err(e) = adapter.send_req(&plan.peer, plan.items, plan.nonce).await {
                    debug!(
                        peer = %plan.peer,
                        nonce = %plan.nonce,
                        items = count,
                        error = %e,
                        "request not sent"
                    );
                }
            });
        }
        drop(self);
        finish_sends(sends, wait, generation, "request").await;
    }

    /// Close the response window and drop all round-scoped state.
    fn end_pull(&self, generation: u64) {
        let mut round = self.round.lock();
        if round.generation != generation || round.phase != RoundPhase::RequestsSent {
            trace!(generation, "stale end-of-round timer");
            return;
        }
        self.accepting_responses.store(false, Ordering::SeqCst);
        round.reset();
        debug!(generation, "round ended");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound messages
    // ─────────────────────────────────────────────────────────────────────────

    /// A peer started a round against us: open a request window for its
    /// nonce and answer with our filtered digest.
    ///
    /// The digest is sent from a separate task, so a slow requester never
    /// holds up other inbound messages.
    pub fn on_hello(&self, nonce: Nonce, context: A::Context) {
        let ttl = self.config.request_wait;
        self.incoming.insert(nonce, ttl);
        let incoming = Arc::clone(&self.incoming);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            incoming.expire(nonce);
        });

        let digest = {
            let allowed = self.filter.predicate(&context);
            let mut digest: Vec<ItemId> = self
                .items
                .snapshot()
                .into_iter()
                .filter(|item| allowed(item))
                .collect();
            digest.sort();
            digest
        };
        if digest.is_empty() {
            trace!(%nonce, ?context, "nothing to advertise");
            return;
        }

        let adapter = Arc::clone(&self.adapter);
        tokio::spawn(async move {
            let count = digest.len();
            if let Err(e) = adapter.send_digest(digest, nonce, &context).await {
                debug!(%nonce, ?context, items = count, error = %e, "digest not sent");
            }
        });
    }

    /// A digest arrived for one of our Hellos.
    pub fn on_digest(&self, digest: Vec<ItemId>, nonce: Nonce, context: &A::Context) {
        if !self.accepting_digests.load(Ordering::SeqCst) {
            trace!(%nonce, ?context, "digest outside window");
            return;
        }

        let mut round = self.round.lock();
        if round.phase != RoundPhase::HelloSent || !round.is_outgoing(nonce) {
            trace!(%nonce, ?context, "digest with unknown nonce");
            return;
        }
        if let Some(added) = round.record_digest(nonce, digest, &self.items) {
            trace!(%nonce, added, "digest recorded");
        }
    }

    /// A peer asks for items after receiving our digest.
    ///
    /// The nonce is consumed: a second Request under the same Hello is
    /// dropped. The response is sent from a separate task.
    pub fn on_req(&self, items: Vec<ItemId>, nonce: Nonce, context: A::Context) {
        if !self.incoming.consume(nonce) {
            trace!(%nonce, ?context, "request with unknown or expired nonce");
            return;
        }

        let to_send: Vec<ItemId> = {
            let _round = self.round.lock();
            let allowed = self.filter.predicate(&context);
            items
                .into_iter()
                .filter(|item| self.items.contains(item) && allowed(item))
                .collect()
        };
        if to_send.is_empty() {
            trace!(%nonce, ?context, "nothing to send");
            return;
        }

        let adapter = Arc::clone(&self.adapter);
        tokio::spawn(async move {
            let count = to_send.len();
            if let Err(e) = adapter.send_res(to_send, &context, nonce).await {
                debug!(%nonce, ?context, items = count, error = %e, "response not sent");
            }
        });
    }

    /// Items arrived for one of our Requests.
    pub fn on_res(&self, items: Vec<ItemId>, nonce: Nonce) {
        if !self.accepting_responses.load(Ordering::SeqCst) {
            trace!(%nonce, "response outside window");
            return;
        }

        let round = self.round.lock();
        if round.phase != RoundPhase::RequestsSent || !round.is_outgoing(nonce) {
            trace!(%nonce, "response with unknown nonce");
            return;
        }
        let added = self.items.add_all(items);
        trace!(%nonce, added, "response merged");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn phase(&self) -> RoundPhase {
        self.round.lock().phase
    }

    /// Generation of the current (or last) round; 0 before the first round.
    pub fn round_generation(&self) -> u64 {
        self.round.lock().generation
    }

    /// Number of distinct missing items collected from digests this round.
    pub fn pending_requests(&self) -> usize {
        self.round.lock().pending_items()
    }

    /// Number of outgoing nonces outstanding this round.
    pub fn outstanding_nonces(&self) -> usize {
        self.round.lock().outstanding_nonces()
    }

    /// Whether every round-scoped structure is empty.
    pub fn is_round_clear(&self) -> bool {
        self.round.lock().is_clear()
    }

    pub fn is_accepting_digests(&self) -> bool {
        self.accepting_digests.load(Ordering::SeqCst)
    }

    pub fn is_accepting_responses(&self) -> bool {
        self.accepting_responses.load(Ordering::SeqCst)
    }

    /// Whether `nonce` currently grants a Request window.
    pub fn accepts_request(&self, nonce: Nonce) -> bool {
        self.incoming.contains(nonce)
    }
}

impl<A: PullAdapter> Drop for PullEngine<A> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Wait for a batch of sends, giving up on whatever is still pending once
/// the window they belong to has closed.
async fn finish_sends(mut sends: JoinSet<()>, limit: Duration, generation: u64, kind: &str) {
    let drained = tokio::time::timeout(limit, async {
        while sends.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        debug!(generation, kind, pending = sends.len(), "sends abandoned at window close");
        sends.abort_all();
    }
}

//! Round-scoped state of the initiator.
//!
//! Everything here lives for exactly one round and is emptied by
//! [`RoundState::reset`]. The engine keeps it behind a single mutex and never
//! exposes the maps directly.

use std::collections::{BTreeMap, HashMap};

use rand::seq::SliceRandom;
use rand::RngCore;

use pullgossip_core::{ItemId, ItemSet, Nonce, OutgoingNonces, PeerId, Result};

/// Where the initiator is within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    /// No round in progress.
    Idle,
    /// Hellos sent; accepting digests.
    HelloSent,
    /// Requests sent; accepting responses.
    RequestsSent,
}

/// One Request the initiator will send when the digest window closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPlan {
    pub peer: PeerId,
    pub nonce: Nonce,
    pub items: Vec<ItemId>,
}

pub(crate) struct RoundState {
    pub(crate) phase: RoundPhase,
    /// Bumped at every round start; timers compare against it.
    pub(crate) generation: u64,
    rng: Box<dyn RngCore + Send>,
    outgoing: OutgoingNonces,
    peer_to_nonce: HashMap<PeerId, Nonce>,
    nonce_to_peer: HashMap<Nonce, PeerId>,
    /// Candidate owners per missing item, in advertisement order.
    item_to_owners: BTreeMap<ItemId, Vec<PeerId>>,
}

impl RoundState {
    pub(crate) fn new<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self {
            phase: RoundPhase::Idle,
            generation: 0,
            rng: Box::new(rng),
            outgoing: OutgoingNonces::new(),
            peer_to_nonce: HashMap::new(),
            nonce_to_peer: HashMap::new(),
            item_to_owners: BTreeMap::new(),
        }
    }

    pub(crate) fn set_rng<R: RngCore + Send + 'static>(&mut self, rng: R) {
        self.rng = Box::new(rng);
    }

    /// Start a new round and return its generation.
    pub(crate) fn begin(&mut self) -> u64 {
        self.reset();
        self.generation += 1;
        self.phase = RoundPhase::HelloSent;
        self.generation
    }

    /// Assign a fresh nonce to `peer` for this round.
    ///
    /// Returns `None` if the peer already has one (duplicate selection).
    pub(crate) fn register_peer(&mut self, peer: PeerId) -> Result<Option<Nonce>> {
        if self.peer_to_nonce.contains_key(&peer) {
            return Ok(None);
        }
        let nonce = self.outgoing.generate(&mut *self.rng)?;
        self.nonce_to_peer.insert(nonce, peer.clone());
        self.peer_to_nonce.insert(peer, nonce);
        Ok(Some(nonce))
    }

    pub(crate) fn is_outgoing(&self, nonce: Nonce) -> bool {
        self.outgoing.contains(nonce)
    }

    /// Record that the peer behind `nonce` advertised `digest`.
    ///
    /// Items already held locally are skipped. Returns the number of
    /// (item, owner) pairs added, or `None` if the nonce maps to no peer.
    pub(crate) fn record_digest(
        &mut self,
        nonce: Nonce,
        digest: Vec<ItemId>,
        held: &ItemSet,
    ) -> Option<usize> {
        let peer = self.nonce_to_peer.get(&nonce)?;
        let mut added = 0;
        for item in digest {
            if held.contains(&item) {
                continue;
            }
            let owners = self.item_to_owners.entry(item).or_default();
            if !owners.contains(peer) {
                owners.push(peer.clone());
                added += 1;
            }
        }
        Some(added)
    }

    /// Pick one owner uniformly at random for every missing item and group
    /// the items into one request per owner.
    ///
    /// Items that became held locally since their digest arrived are left out.
    pub(crate) fn plan_requests(&mut self, held: &ItemSet) -> Vec<RequestPlan> {
        let mut by_peer: BTreeMap<PeerId, Vec<ItemId>> = BTreeMap::new();
        for (item, owners) in &self.item_to_owners {
            if held.contains(item) {
                continue;
            }
            if let Some(owner) = owners.choose(&mut *self.rng) {
                by_peer.entry(owner.clone()).or_default().push(item.clone());
            }
        }

        by_peer
            .into_iter()
            .filter_map(|(peer, items)| {
                let nonce = *self.peer_to_nonce.get(&peer)?;
                Some(RequestPlan { peer, nonce, items })
            })
            .collect()
    }

    /// Empty every round-scoped structure and return to idle.
    pub(crate) fn reset(&mut self) {
        self.phase = RoundPhase::Idle;
        self.outgoing.clear();
        self.peer_to_nonce.clear();
        self.nonce_to_peer.clear();
        self.item_to_owners.clear();
    }

    pub(crate) fn pending_items(&self) -> usize {
        self.item_to_owners.len()
    }

    pub(crate) fn outstanding_nonces(&self) -> usize {
        self.outgoing.len()
    }

    pub(crate) fn is_clear(&self) -> bool {
        self.outgoing.is_empty()
            && self.peer_to_nonce.is_empty()
            && self.nonce_to_peer.is_empty()
            && self.item_to_owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn state() -> RoundState {
        RoundState::new(StdRng::seed_from_u64(7))
    }

    fn ids(items: &[&str]) -> Vec<ItemId> {
        items.iter().map(|s| ItemId::from(*s)).collect()
    }

    #[test]
    fn test_begin_bumps_generation() {
        let mut state = state();
        assert_eq!(state.begin(), 1);
        assert_eq!(state.phase, RoundPhase::HelloSent);
        state.reset();
        assert_eq!(state.begin(), 2);
    }

    #[test]
    fn test_duplicate_peer_gets_one_nonce() {
        let mut state = state();
        state.begin();
        assert!(state.register_peer("p1".into()).unwrap().is_some());
        assert!(state.register_peer("p1".into()).unwrap().is_none());
        assert_eq!(state.outstanding_nonces(), 1);
    }

    #[test]
    fn test_record_digest_skips_held_items() {
        let mut state = state();
        state.begin();
        let nonce = state.register_peer("p1".into()).unwrap().unwrap();

        let held = ItemSet::new();
        held.add("a".into());

        let added = state.record_digest(nonce, ids(&["a", "b"]), &held);
        assert_eq!(added, Some(1));
        assert_eq!(state.pending_items(), 1);
    }

    #[test]
    fn test_record_digest_unknown_nonce() {
        let mut state = state();
        state.begin();
        assert_eq!(state.record_digest(Nonce(1), ids(&["a"]), &ItemSet::new()), None);
        assert_eq!(state.pending_items(), 0);
    }

    #[test]
    fn test_each_item_requested_from_exactly_one_owner() {
        let mut state = state();
        state.begin();
        let held = ItemSet::new();
        let owners: Vec<PeerId> = vec!["p1".into(), "p2".into(), "p3".into()];
        for peer in &owners {
            let nonce = state.register_peer(peer.clone()).unwrap().unwrap();
            state.record_digest(nonce, ids(&["x", "y", "z"]), &held);
        }

        let plans = state.plan_requests(&held);
        let mut requested = Vec::new();
        for plan in &plans {
            assert!(owners.contains(&plan.peer));
            requested.extend(plan.items.iter().cloned());
        }
        requested.sort();
        assert_eq!(requested, ids(&["x", "y", "z"]));

        let peers: HashSet<_> = plans.iter().map(|p| p.peer.clone()).collect();
        assert_eq!(peers.len(), plans.len(), "one request per peer");
    }

    #[test]
    fn test_owner_choice_spreads_load() {
        let mut state = state();
        state.begin();
        let held = ItemSet::new();
        let items: Vec<ItemId> = (0..200).map(|i| ItemId::new(format!("i{i}"))).collect();
        for peer in ["p1", "p2"] {
            let nonce = state.register_peer(peer.into()).unwrap().unwrap();
            state.record_digest(nonce, items.clone(), &held);
        }

        let plans = state.plan_requests(&held);
        assert_eq!(plans.len(), 2);
        for plan in plans {
            // Uniform choice: both owners get a sizeable share.
            assert!(plan.items.len() > 50, "{} got {}", plan.peer, plan.items.len());
        }
    }

    #[test]
    fn test_plan_skips_items_acquired_meanwhile() {
        let mut state = state();
        state.begin();
        let held = ItemSet::new();
        let nonce = state.register_peer("p1".into()).unwrap().unwrap();
        state.record_digest(nonce, ids(&["a", "b"]), &held);

        held.add("a".into());
        let plans = state.plan_requests(&held);
        assert_eq!(
            plans,
            vec![RequestPlan {
                peer: "p1".into(),
                nonce,
                items: ids(&["b"]),
            }]
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = state();
        state.begin();
        let nonce = state.register_peer("p1".into()).unwrap().unwrap();
        state.record_digest(nonce, ids(&["a"]), &ItemSet::new());

        state.reset();
        assert!(state.is_clear());
        assert_eq!(state.phase, RoundPhase::Idle);
        assert!(!state.is_outgoing(nonce));
    }
}

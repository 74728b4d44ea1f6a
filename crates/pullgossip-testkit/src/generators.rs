//! Proptest generators for property-based testing.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use pullgossip_core::{ItemId, Nonce, PeerId};

/// Generate an item identifier from a small alphabet so collisions between
/// peers' digests are common.
pub fn item_id() -> impl Strategy<Value = ItemId> {
    "[a-f]{1,2}".prop_map(ItemId::from)
}

/// Generate a peer identifier.
pub fn peer_id() -> impl Strategy<Value = PeerId> {
    (0u8..16).prop_map(|n| PeerId::new(format!("peer-{n}")))
}

/// Generate a nonce.
pub fn nonce() -> impl Strategy<Value = Nonce> {
    any::<u64>().prop_map(Nonce)
}

/// Generate what each peer advertises in a round: at least one peer, each
/// with a possibly empty digest.
pub fn advertisements(
    max_peers: usize,
    max_items: usize,
) -> impl Strategy<Value = BTreeMap<PeerId, BTreeSet<ItemId>>> {
    prop::collection::btree_map(
        peer_id(),
        prop::collection::btree_set(item_id(), 0..=max_items),
        1..=max_peers,
    )
}

/// One mutation of an item set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOp {
    Add(ItemId),
    Remove(ItemId),
}

/// Generate a sequence of add/remove operations.
pub fn set_ops(max_len: usize) -> impl Strategy<Value = Vec<SetOp>> {
    prop::collection::vec(
        prop_oneof![
            item_id().prop_map(SetOp::Add),
            item_id().prop_map(SetOp::Remove),
        ],
        0..=max_len,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn advertisements_are_nonempty(ads in advertisements(4, 6)) {
            prop_assert!(!ads.is_empty());
            prop_assert!(ads.len() <= 4);
            for items in ads.values() {
                prop_assert!(items.len() <= 6);
            }
        }

        #[test]
        fn item_ids_are_short(id in item_id()) {
            prop_assert!(!id.as_str().is_empty());
            prop_assert!(id.as_str().len() <= 2);
        }
    }
}

//! Digest filters.
//!
//! A digest filter decides which items may be revealed to a given requester.
//! It is two-stage: the requester's context is turned into a predicate once
//! per Hello or Request, and the predicate is then applied to every item.

use crate::types::ItemId;

/// Predicate over item identifiers produced for one requester.
pub type ItemPredicate = Box<dyn Fn(&ItemId) -> bool + Send>;

/// Per-requester visibility policy, supplied by the surrounding application.
///
/// Implemented for any `Fn(&C) -> P` closure where `P` is an item predicate:
///
/// ```
/// use pullgossip_core::{DigestFilter, ItemId};
///
/// // Hide "private-*" items from everyone except "admin".
/// let filter = |requester: &String| {
///     let admin = requester == "admin";
///     move |item: &ItemId| admin || !item.as_str().starts_with("private-")
/// };
///
/// let pred = filter.predicate(&"guest".to_string());
/// assert!(pred(&ItemId::from("block-1")));
/// assert!(!pred(&ItemId::from("private-1")));
/// ```
pub trait DigestFilter<C>: Send + Sync {
    /// Build the item predicate for the requester described by `context`.
    fn predicate(&self, context: &C) -> ItemPredicate;
}

impl<C, F, P> DigestFilter<C> for F
where
    F: Fn(&C) -> P + Send + Sync,
    P: Fn(&ItemId) -> bool + Send + 'static,
{
    fn predicate(&self, context: &C) -> ItemPredicate {
        Box::new(self(context))
    }
}

/// The default policy: every item is visible to every requester.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<C> DigestFilter<C> for AcceptAll {
    fn predicate(&self, _context: &C) -> ItemPredicate {
        Box::new(|_| true)
    }
}

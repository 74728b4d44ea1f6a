//! Nonce registries.
//!
//! Two independent registries exist: one for nonces this peer generated
//! when initiating a round, and one for nonces received in a Hello from a
//! peer initiating a round against us.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use rand::RngCore;
use tokio::time::Instant;

use crate::error::{PullError, Result};
use crate::types::Nonce;

/// Maximum draws before nonce generation gives up.
///
/// With a 64-bit space and a handful of outstanding nonces a collision is
/// already vanishingly rare; hitting this bound means the random source is
/// broken.
pub const MAX_NONCE_ATTEMPTS: usize = 64;

/// Nonces issued by the local initiator for the current round.
///
/// Not internally synchronized: it lives inside the engine's round state and
/// is only touched under the round lock.
#[derive(Debug, Default)]
pub struct OutgoingNonces {
    outstanding: HashSet<Nonce>,
}

impl OutgoingNonces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh nonce that is not currently outstanding and register it.
    pub fn generate<R: RngCore + ?Sized>(&mut self, rng: &mut R) -> Result<Nonce> {
        for _ in 0..MAX_NONCE_ATTEMPTS {
            let nonce = Nonce(rng.next_u64());
            if self.outstanding.insert(nonce) {
                return Ok(nonce);
            }
        }
        Err(PullError::NonceExhausted {
            attempts: MAX_NONCE_ATTEMPTS,
        })
    }

    pub fn contains(&self, nonce: Nonce) -> bool {
        self.outstanding.contains(&nonce)
    }

    pub fn clear(&mut self) {
        self.outstanding.clear();
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }
}

/// Nonces accepted from remote initiators, each valid until a deadline.
///
/// A nonce is live while its deadline lies in the future. Removal is driven
/// by timers calling [`IncomingNonces::expire`], but `contains` checks the
/// deadline itself so a late timer can never extend a window.
#[derive(Debug, Default)]
pub struct IncomingNonces {
    deadlines: Mutex<HashMap<Nonce, Instant>>,
}

impl IncomingNonces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `nonce` for `ttl`. Re-inserting a live nonce pushes its deadline out.
    pub fn insert(&self, nonce: Nonce, ttl: Duration) {
        self.deadlines.lock().insert(nonce, Instant::now() + ttl);
    }

    /// Whether `nonce` is tracked and not yet past its deadline.
    pub fn contains(&self, nonce: Nonce) -> bool {
        self.deadlines
            .lock()
            .get(&nonce)
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Remove `nonce` if, and only if, it has expired.
    ///
    /// Returns `true` if an entry was removed.
    pub fn expire(&self, nonce: Nonce) -> bool {
        let mut deadlines = self.deadlines.lock();
        match deadlines.get(&nonce) {
            Some(deadline) if *deadline <= Instant::now() => {
                deadlines.remove(&nonce);
                true
            }
            _ => false,
        }
    }

    /// Check-and-remove a live nonce in one step.
    ///
    /// Returns `false` (and leaves the registry untouched) when the nonce is
    /// unknown or already past its deadline.
    pub fn consume(&self, nonce: Nonce) -> bool {
        let mut deadlines = self.deadlines.lock();
        match deadlines.get(&nonce) {
            Some(deadline) if *deadline > Instant::now() => {
                deadlines.remove(&nonce);
                true
            }
            _ => false,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut deadlines = self.deadlines.lock();
        let before = deadlines.len();
        deadlines.retain(|_, deadline| *deadline > now);
        before - deadlines.len()
    }

    pub fn len(&self) -> usize {
        self.deadlines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Replays a fixed sequence of values, then repeats the last one.
    struct ScriptedRng {
        values: Vec<u64>,
        pos: usize,
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        fn next_u64(&mut self) -> u64 {
            let value = self.values[self.pos.min(self.values.len() - 1)];
            self.pos += 1;
            value
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for chunk in dest.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_generate_is_unique_among_outstanding() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut nonces = OutgoingNonces::new();
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let nonce = nonces.generate(&mut rng).unwrap();
            assert!(seen.insert(nonce));
        }
        assert_eq!(nonces.len(), 100);
    }

    #[test]
    fn test_generate_redraws_on_collision() {
        let mut rng = ScriptedRng {
            values: vec![7, 7, 7, 9],
            pos: 0,
        };
        let mut nonces = OutgoingNonces::new();
        assert_eq!(nonces.generate(&mut rng).unwrap(), Nonce(7));
        assert_eq!(nonces.generate(&mut rng).unwrap(), Nonce(9));
    }

    #[test]
    fn test_generate_gives_up_on_stuck_source() {
        let mut rng = ScriptedRng {
            values: vec![3],
            pos: 0,
        };
        let mut nonces = OutgoingNonces::new();
        nonces.generate(&mut rng).unwrap();

        let err = nonces.generate(&mut rng).unwrap_err();
        assert!(matches!(
            err,
            PullError::NonceExhausted { attempts } if attempts == MAX_NONCE_ATTEMPTS
        ));
    }

    #[test]
    fn test_clear_forgets_outstanding() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut nonces = OutgoingNonces::new();
        let nonce = nonces.generate(&mut rng).unwrap();
        nonces.clear();
        assert!(!nonces.contains(nonce));
        assert!(nonces.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_incoming_nonce_expires() {
        let nonces = IncomingNonces::new();
        nonces.insert(Nonce(1), Duration::from_millis(100));
        assert!(nonces.contains(Nonce(1)));
        assert!(!nonces.expire(Nonce(1)));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!nonces.contains(Nonce(1)));
        assert!(nonces.expire(Nonce(1)));
        assert!(nonces.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_survives_older_timer() {
        let nonces = IncomingNonces::new();
        nonces.insert(Nonce(5), Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(60)).await;
        nonces.insert(Nonce(5), Duration::from_millis(100));

        // The first window's timer fires here; the nonce was re-armed.
        tokio::time::advance(Duration::from_millis(40)).await;
        assert!(!nonces.expire(Nonce(5)));
        assert!(nonces.contains(Nonce(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_is_single_use() {
        let nonces = IncomingNonces::new();
        nonces.insert(Nonce(9), Duration::from_millis(100));
        assert!(nonces.consume(Nonce(9)));
        assert!(!nonces.consume(Nonce(9)));
        assert!(!nonces.contains(Nonce(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let nonces = IncomingNonces::new();
        nonces.insert(Nonce(1), Duration::from_millis(10));
        nonces.insert(Nonce(2), Duration::from_millis(1000));
        tokio::time::advance(Duration::from_millis(20)).await;

        assert_eq!(nonces.purge_expired(), 1);
        assert_eq!(nonces.len(), 1);
        assert!(nonces.contains(Nonce(2)));
    }
}

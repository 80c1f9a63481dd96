use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Uniform integer draws shared by every request.
pub trait RandomSource: Send + Sync {
    /// Uniform draw in `[0, bound)`. `bound` is never zero.
    fn below(&self, bound: usize) -> usize;
}

/// Draws from the calling thread's rng; no shared state between requests.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, bound: usize) -> usize {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Reproducible draws from a single seeded generator.
pub struct SeededRandom(Mutex<StdRng>);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, bound: usize) -> usize {
        // a poisoned lock still holds a usable generator
        let mut rng = self.0.lock().unwrap_or_else(|p| p.into_inner());
        rng.gen_range(0..bound)
    }
}

/// Chance of continuing is `CONTINUE_BELOW / CONTINUE_OUT_OF`.
pub const CONTINUE_OUT_OF: usize = 3;
pub const CONTINUE_BELOW: usize = 2;

/// Decide whether this node forwards the request one hop further.
///
/// Never continues without peers or once `hops` has reached `max_hops`.
pub fn should_continue(
    peer_count: usize,
    hops: u32,
    max_hops: u32,
    rng: &dyn RandomSource,
) -> bool {
    if peer_count == 0 || hops >= max_hops {
        return false;
    }
    rng.below(CONTINUE_OUT_OF) < CONTINUE_BELOW
}

/// Index of the peer to forward to. `peer_count` must be non-zero.
pub fn select_peer(peer_count: usize, rng: &dyn RandomSource) -> usize {
    rng.below(peer_count)
}
